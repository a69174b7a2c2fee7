//! Typed statement model for generated Python.
//!
//! Generated code is accumulated as a list of lines with an explicit
//! indentation level instead of pre-indented text, so indentation can be
//! checked independently of the whitespace convention used at render time.

use std::fmt::Write;

/// Default indentation unit (spaces per level).
pub const DEFAULT_INDENT: usize = 4;

/// One emitted statement line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub indent: usize,
    pub text: String,
}

/// A block of generated statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Code {
    lines: Vec<Line>,
    level: usize,
}

impl Code {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a statement at the current indentation level.
    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(Line {
            indent: self.level,
            text: text.into(),
        });
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(Line {
            indent: 0,
            text: String::new(),
        });
        self
    }

    pub fn comment(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.line(format!("# {}", text.as_ref()))
    }

    pub fn indent(&mut self) -> &mut Self {
        self.level += 1;
        self
    }

    pub fn dedent(&mut self) -> &mut Self {
        self.level = self.level.saturating_sub(1);
        self
    }

    /// Current indentation level.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Open a block: push `header` and indent.
    pub fn open(&mut self, header: impl Into<String>) -> &mut Self {
        self.line(header);
        self.indent()
    }

    /// Append another block, shifted to the current indentation level.
    pub fn extend_nested(&mut self, other: Code) -> &mut Self {
        let base = self.level;
        for line in other.lines {
            if line.text.is_empty() {
                self.lines.push(line);
            } else {
                self.lines.push(Line {
                    indent: line.indent + base,
                    text: line.text,
                });
            }
        }
        self
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.text.contains(needle))
    }

    /// Render with `unit` spaces per indentation level.
    pub fn render(&self, unit: usize) -> String {
        let mut out = String::new();
        for line in &self.lines {
            if !line.text.is_empty() {
                let _ = write!(out, "{:width$}{}", "", line.text, width = line.indent * unit);
            }
            out.push('\n');
        }
        out
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render(DEFAULT_INDENT))
    }
}

/// Quote `s` as a single-quoted Python string literal.
pub fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    push_escaped(&mut out, s);
    out.push('\'');
    out
}

/// Quote `s` as a Python f-string literal, keeping `{`/`}` literal.
pub fn py_fstr_literal(s: &str) -> String {
    s.replace('{', "{{").replace('}', "}}")
}

pub(crate) fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
}
