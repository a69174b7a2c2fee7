//! Expression rendering with lexical scope.

use super::naming::{param_identifier, python_identifier};
use crate::error::{GenError, GenResult};
use crate::ir::{Expression, Step};

/// Stack of name bindings introduced by enclosing loops. Innermost wins.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    frames: Vec<Vec<(String, String)>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    pub fn pop_frame(&mut self) -> Option<Vec<(String, String)>> {
        self.frames.pop()
    }

    /// Bind `name` to `target` in the innermost frame, opening one if needed.
    pub fn bind(&mut self, name: impl Into<String>, target: impl Into<String>) {
        if self.frames.is_empty() {
            self.push_frame();
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.push((name.into(), target.into()));
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(bound, _)| bound == name)
            .map(|(_, target)| target.as_str())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Renders IR expressions from the expression table into Python.
#[derive(Debug, Clone, Copy)]
pub struct ExprRenderer<'a> {
    expressions: &'a [Expression],
}

impl<'a> ExprRenderer<'a> {
    pub fn new(expressions: &'a [Expression]) -> Self {
        Self { expressions }
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Look up an expression, validating the index.
    pub fn get(&self, index: usize) -> GenResult<&'a Expression> {
        self.expressions
            .get(index)
            .ok_or(GenError::ExpressionOutOfRange {
                index,
                len: self.expressions.len(),
            })
    }

    /// Render expression `index` as a Python expression.
    pub fn render(&self, index: usize, scope: &Scope) -> GenResult<String> {
        let expr = self.get(index)?;
        let (root, rest) = expr
            .steps
            .split_first()
            .ok_or(GenError::EmptyExpression(index))?;

        let base = match root {
            Step::Identifier { identifier } => match scope.lookup(identifier) {
                Some(bound) => bound.to_string(),
                None => param_identifier(identifier),
            },
            _ => {
                return Err(GenError::InvalidExpression {
                    index,
                    message: "first step must be an identifier".to_string(),
                });
            }
        };

        Ok(fold(base, rest, index)?.0)
    }

    /// Render expression `index` as a boolean condition, negated if `negate`.
    pub fn render_condition(&self, index: usize, scope: &Scope, negate: bool) -> GenResult<String> {
        let rendered = self.render(index, scope)?;
        Ok(if negate {
            format!("not ({})", rendered)
        } else {
            format!("({})", rendered)
        })
    }
}

/// Fold the remaining steps onto `base`. The flag reports whether the
/// result is a conditional expression.
fn fold(base: String, steps: &[Step], index: usize) -> GenResult<(String, bool)> {
    let Some((step, rest)) = steps.split_first() else {
        return Ok((base, false));
    };

    let (access, guard) = match step {
        Step::Identifier { .. } => {
            return Err(GenError::InvalidExpression {
                index,
                message: "identifier step after the root".to_string(),
            });
        }
        Step::Member { property, safe } => (
            format!("{}.{}", base, python_identifier(property)),
            safe.then(|| format!("{} is None", base)),
        ),
        Step::Index { index: position, safe } => (
            format!("{}[{}]", base, position),
            safe.then(|| format!("({} is None or len({}) <= {})", base, base, position)),
        ),
    };

    let (continuation, nested) = fold(access, rest, index)?;
    Ok(match guard {
        Some(cond) if nested => (format!("None if {} else ({})", cond, continuation), true),
        Some(cond) => (format!("None if {} else {}", cond, continuation), true),
        None => (continuation, nested),
    })
}
