//! Instruction lowering: optimized IR instructions to SQL-building Python.
//!
//! Instruction streams without control flow become one static SQL string
//! plus an argument list. Anything with conditionals or loops becomes a
//! sequence of statements that assemble `sql_parts` and `args` at run time.

use super::code::{push_escaped, py_str, py_fstr_literal, Code};
use super::expr::{ExprRenderer, Scope};
use super::naming::{param_identifier, python_identifier};
use super::traits::Driver;
use super::Dialect;
use crate::error::{GenError, GenResult};
use crate::ir::Instruction;
use std::collections::VecDeque;
use tracing::debug;

/// Marker for a positional parameter inside static SQL text.
pub const PLACEHOLDER_MARKER: char = '?';

/// Result of lowering an instruction stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlBuild {
    /// SQL text known at generation time, with Python argument expressions.
    Static { sql: String, args: Vec<String> },
    /// Statements that bind `sql` and `args` at run time.
    Dynamic { body: Code },
}

impl SqlBuild {
    pub fn is_static(&self) -> bool {
        matches!(self, SqlBuild::Static { .. })
    }

    /// Statements binding `sql` and `args`.
    pub fn to_code(&self) -> Code {
        match self {
            SqlBuild::Static { sql, args } => {
                let mut code = Code::new();
                code.line(format!("sql = {}", py_str(sql)));
                code.line(format!("args = [{}]", args.join(", ")));
                code
            }
            SqlBuild::Dynamic { body } => body.clone(),
        }
    }
}

/// Whether the stream needs run-time SQL assembly.
pub fn needs_dynamic(instructions: &[Instruction]) -> bool {
    instructions.iter().any(Instruction::is_control_flow)
}

/// Lower `instructions` for `dialect`.
///
/// `scope` carries bindings visible to every expression (usually empty).
pub fn lower(
    instructions: &[Instruction],
    renderer: &ExprRenderer<'_>,
    scope: &Scope,
    dialect: Dialect,
) -> GenResult<SqlBuild> {
    let dynamic = needs_dynamic(instructions);
    debug!(
        dialect = %dialect,
        instructions = instructions.len(),
        dynamic,
        "lowering SQL instructions"
    );

    let lowering = Lowering::new(renderer, scope.clone(), dialect);
    if dynamic {
        lowering.lower_dynamic(instructions)
    } else {
        lowering.lower_static(instructions)
    }
}

/// Whether a delimiter outside any loop is dropped at generation time.
fn boundary_is_redundant(next: Option<&Instruction>) -> bool {
    match next {
        None | Some(Instruction::End) | Some(Instruction::Boundary) => true,
        Some(Instruction::EmitStatic { value }) => value.trim_start().starts_with(')'),
        Some(_) => false,
    }
}

/// Content directly followed by a delimiter or a reset leaves the flag alone.
fn skips_boundary_flag(next: Option<&Instruction>) -> bool {
    matches!(
        next,
        Some(Instruction::EmitUnlessBoundary { .. }) | Some(Instruction::Boundary)
    )
}

/// A run-time argument position reserved ahead of its value.
#[derive(Debug)]
enum Slot {
    /// Embedded marker waiting for its ADD_PARAM.
    Marker,
    /// Evaluated value held back until earlier markers are bound.
    Deferred(String),
}

#[derive(Debug)]
enum FrameKind {
    If,
    /// Generated per-iteration variable name.
    For { var: String },
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    /// Line count when the current branch body started.
    body_start: usize,
}

/// Lowering state. Lives for one call; nothing is shared between calls.
struct Lowering<'r, 'a> {
    renderer: &'r ExprRenderer<'a>,
    driver: Box<dyn Driver>,
    scope: Scope,
    stack: Vec<Frame>,
    code: Code,
    loop_counter: usize,
    /// Argument positions handed out in SQL text but not yet appended.
    pending: VecDeque<Slot>,
    boundary_var: bool,
}

impl<'r, 'a> Lowering<'r, 'a> {
    fn new(renderer: &'r ExprRenderer<'a>, scope: Scope, dialect: Dialect) -> Self {
        Self {
            renderer,
            driver: dialect.driver(),
            scope,
            stack: Vec::new(),
            code: Code::new(),
            loop_counter: 0,
            pending: VecDeque::new(),
            boundary_var: false,
        }
    }

    fn system_value(field: &str) -> String {
        param_identifier(field)
    }

    // ---------------------------------------------------------------------
    // Static path
    // ---------------------------------------------------------------------

    fn lower_static(self, instructions: &[Instruction]) -> GenResult<SqlBuild> {
        let mut sql = String::new();
        // Marker slots stay `None` until their ADD_PARAM arrives.
        let mut args: Vec<Option<String>> = Vec::new();
        let mut open_slots: VecDeque<usize> = VecDeque::new();
        let mut position = 1;
        let mut boundary_needed = false;

        for (i, inst) in instructions.iter().enumerate() {
            let next = instructions.get(i + 1);
            match inst {
                Instruction::EmitStatic { value } => {
                    for (n, segment) in value.split(PLACEHOLDER_MARKER).enumerate() {
                        if n > 0 {
                            sql.push_str(&self.driver.placeholder(position));
                            position += 1;
                            open_slots.push_back(args.len());
                            args.push(None);
                        }
                        sql.push_str(&self.driver.escape_literal(segment));
                    }
                    if !skips_boundary_flag(next) {
                        boundary_needed = true;
                    }
                }
                Instruction::EmitEval { expr_index } => {
                    sql.push_str(&self.driver.placeholder(position));
                    position += 1;
                    args.push(Some(self.renderer.render(*expr_index, &self.scope)?));
                    if !skips_boundary_flag(next) {
                        boundary_needed = true;
                    }
                }
                Instruction::AddParam { expr_index } => {
                    let value = self.renderer.render(*expr_index, &self.scope)?;
                    self.bind_static_arg(&mut sql, &mut position, &mut args, &mut open_slots, value);
                }
                Instruction::AddSystemParam { system_field } => {
                    let value = Self::system_value(system_field);
                    self.bind_static_arg(&mut sql, &mut position, &mut args, &mut open_slots, value);
                }
                Instruction::EmitUnlessBoundary { value } => {
                    if boundary_needed && !boundary_is_redundant(next) {
                        sql.push_str(&self.driver.escape_literal(value));
                    }
                }
                Instruction::Boundary => boundary_needed = false,
                other => {
                    return Err(GenError::control_flow(format!(
                        "{} in static instruction stream",
                        other.op_name()
                    )));
                }
            }
        }

        let args = args.into_iter().flatten().collect();
        Ok(SqlBuild::Static { sql, args })
    }

    /// Fill the oldest open marker slot, or append a fresh placeholder.
    fn bind_static_arg(
        &self,
        sql: &mut String,
        position: &mut usize,
        args: &mut Vec<Option<String>>,
        open_slots: &mut VecDeque<usize>,
        value: String,
    ) {
        match open_slots.pop_front() {
            Some(slot) => args[slot] = Some(value),
            None => {
                sql.push_str(&self.driver.placeholder(*position));
                *position += 1;
                args.push(Some(value));
            }
        }
    }

    // ---------------------------------------------------------------------
    // Dynamic path
    // ---------------------------------------------------------------------

    fn lower_dynamic(mut self, instructions: &[Instruction]) -> GenResult<SqlBuild> {
        self.boundary_var = needs_boundary_flag(instructions);

        self.code.comment("Build SQL dynamically");
        self.code.line("sql_parts = []");
        self.code.line("args = []");
        if self.boundary_var {
            self.code.line("boundary_needed = False");
        }

        for (i, inst) in instructions.iter().enumerate() {
            let next = instructions.get(i + 1);
            self.lower_instruction(inst, next)?;
        }

        if let Some(frame) = self.stack.last() {
            let kind = match frame.kind {
                FrameKind::If => "IF",
                FrameKind::For { .. } => "LOOP_START",
            };
            return Err(GenError::control_flow(format!(
                "{} block is never closed ({} open)",
                kind,
                self.stack.len()
            )));
        }

        self.code.blank();
        self.code.line("sql = ''.join(sql_parts)");
        Ok(SqlBuild::Dynamic { body: self.code })
    }

    fn lower_instruction(&mut self, inst: &Instruction, next: Option<&Instruction>) -> GenResult<()> {
        match inst {
            Instruction::EmitStatic { value } => {
                let literal = self.static_fragment(value);
                self.code.line(format!("sql_parts.append({})", literal));
                self.mark_content(next);
            }
            Instruction::EmitEval { expr_index } => {
                let value = self.renderer.render(*expr_index, &self.scope)?;
                let numbered = self.driver.numbered_placeholders();
                let placeholder = if self.pending.is_empty() {
                    self.code.line(format!("args.append({})", value));
                    if numbered {
                        "f'${len(args)}'".to_string()
                    } else {
                        py_str(&self.driver.placeholder(1))
                    }
                } else {
                    self.pending.push_back(Slot::Deferred(value));
                    if numbered {
                        format!("f'${{len(args) + {}}}'", self.pending.len())
                    } else {
                        py_str(&self.driver.placeholder(1))
                    }
                };
                self.code.line(format!("sql_parts.append({})", placeholder));
                self.mark_content(next);
            }
            Instruction::AddParam { expr_index } => {
                let value = self.renderer.render(*expr_index, &self.scope)?;
                self.bind_dynamic_arg(value);
            }
            Instruction::AddSystemParam { system_field } => {
                self.bind_dynamic_arg(Self::system_value(system_field));
            }
            Instruction::If { expr_index } => {
                let cond = self.condition(*expr_index)?;
                self.code.open(format!("if {}:", cond));
                self.stack.push(Frame {
                    kind: FrameKind::If,
                    body_start: self.code.len(),
                });
            }
            Instruction::ElseIf { expr_index } => {
                let cond = self.condition(*expr_index)?;
                self.next_branch(format!("elif {}:", cond), "ELSE_IF")?;
            }
            Instruction::Else => self.next_branch("else:".to_string(), "ELSE")?,
            Instruction::End => {
                let frame = self.close_frame("END")?;
                if let FrameKind::For { .. } = frame.kind {
                    self.scope.pop_frame();
                }
            }
            Instruction::LoopStart {
                variable,
                collection_expr_index,
            } => self.open_loop(variable, *collection_expr_index)?,
            Instruction::LoopEnd => {
                let frame = self.close_frame("LOOP_END")?;
                match frame.kind {
                    FrameKind::For { .. } => {
                        self.scope.pop_frame();
                    }
                    FrameKind::If => {
                        return Err(GenError::control_flow("LOOP_END closes an IF block"));
                    }
                }
            }
            Instruction::EmitUnlessBoundary { value } => {
                let literal = py_str(&self.driver.escape_literal(value));
                if let Some(var) = self.innermost_loop_var().map(str::to_string) {
                    self.code.open(format!("if not {}_is_last:", var));
                    self.code.line(format!("sql_parts.append({})", literal));
                    self.code.dedent();
                } else if !boundary_is_redundant(next) {
                    self.code.open("if boundary_needed:");
                    self.code.line(format!("sql_parts.append({})", literal));
                    self.code.dedent();
                }
            }
            Instruction::Boundary => {
                if self.boundary_var {
                    self.code.line("boundary_needed = False");
                }
            }
        }
        Ok(())
    }

    /// Append a bound value, then any held-back values it was blocking.
    fn bind_dynamic_arg(&mut self, value: String) {
        self.code.line(format!("args.append({})", value));
        if self.pending.pop_front().is_none() {
            return;
        }
        while let Some(Slot::Deferred(_)) = self.pending.front() {
            if let Some(Slot::Deferred(held)) = self.pending.pop_front() {
                self.code.line(format!("args.append({})", held));
            }
        }
    }

    /// Python literal for a static fragment, with embedded markers replaced.
    fn static_fragment(&mut self, value: &str) -> String {
        let segments: Vec<&str> = value.split(PLACEHOLDER_MARKER).collect();
        let markers = segments.len() - 1;

        if markers > 0 && self.driver.numbered_placeholders() {
            let mut out = String::from("f'");
            for (n, segment) in segments.iter().enumerate() {
                if n > 0 {
                    self.pending.push_back(Slot::Marker);
                    out.push_str(&format!("${{len(args) + {}}}", self.pending.len()));
                }
                push_escaped(&mut out, &py_fstr_literal(&self.driver.escape_literal(segment)));
            }
            out.push('\'');
            return out;
        }

        let mut text = String::with_capacity(value.len());
        for (n, segment) in segments.iter().enumerate() {
            if n > 0 {
                self.pending.push_back(Slot::Marker);
                text.push_str(&self.driver.placeholder(n));
            }
            text.push_str(&self.driver.escape_literal(segment));
        }
        py_str(&text)
    }

    /// Content outside loops arms the delimiter flag.
    fn mark_content(&mut self, next: Option<&Instruction>) {
        if self.boundary_var && self.innermost_loop_var().is_none() && !skips_boundary_flag(next)
        {
            self.code.line("boundary_needed = True");
        }
    }

    fn condition(&self, expr_index: usize) -> GenResult<String> {
        let rendered = self.renderer.render(expr_index, &self.scope)?;
        Ok(if rendered.contains(" if ") {
            format!("({})", rendered)
        } else {
            rendered
        })
    }

    fn innermost_loop_var(&self) -> Option<&str> {
        self.stack.iter().rev().find_map(|frame| match &frame.kind {
            FrameKind::For { var } => Some(var.as_str()),
            FrameKind::If => None,
        })
    }

    /// Close the body of the current branch, emitting `pass` if it is empty.
    fn close_body(&mut self, body_start: usize) {
        if self.code.len() == body_start {
            self.code.line("pass");
        }
        self.code.dedent();
    }

    fn next_branch(&mut self, header: String, op: &str) -> GenResult<()> {
        let body_start = match self.stack.last() {
            Some(Frame {
                kind: FrameKind::If,
                body_start,
            }) => *body_start,
            Some(_) => {
                return Err(GenError::control_flow(format!("{} inside a loop without IF", op)));
            }
            None => return Err(GenError::control_flow(format!("{} without open IF", op))),
        };
        self.close_body(body_start);
        self.code.open(header);
        let len = self.code.len();
        if let Some(frame) = self.stack.last_mut() {
            frame.body_start = len;
        }
        Ok(())
    }

    fn close_frame(&mut self, op: &str) -> GenResult<Frame> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| GenError::control_flow(format!("{} without open block", op)))?;
        self.close_body(frame.body_start);
        Ok(frame)
    }

    fn open_loop(&mut self, variable: &str, collection_expr_index: usize) -> GenResult<()> {
        // Collection is evaluated in the enclosing scope.
        let collection = self.renderer.render(collection_expr_index, &self.scope)?;

        self.loop_counter += 1;
        let n = self.loop_counter;
        let var = format!("{}_{}", python_identifier(variable), n);
        let src = format!("_loop_src_{}", n);
        let items = format!("_loop_items_{}", n);

        self.code.line(format!("{} = {}", src, collection));
        self.code.line(format!(
            "{items} = [] if {src} is None else list({src}) if isinstance({src}, (list, tuple, set, frozenset)) else [{src}]",
        ));
        self.code
            .open(format!("for {var}_idx, {var} in enumerate({items}):"));
        let body_start = self.code.len();
        self.code
            .line(format!("{var}_is_last = {var}_idx == len({items}) - 1"));

        self.scope.push_frame();
        self.scope.bind(variable, var.clone());
        self.stack.push(Frame {
            kind: FrameKind::For { var },
            body_start,
        });
        Ok(())
    }
}

/// The `boundary_needed` flag exists only when a delimiter or boundary appears outside loops.
fn needs_boundary_flag(instructions: &[Instruction]) -> bool {
    let mut depth = 0usize;
    for inst in instructions {
        match inst {
            Instruction::LoopStart { .. } => depth += 1,
            Instruction::LoopEnd => depth = depth.saturating_sub(1),
            Instruction::EmitUnlessBoundary { .. } | Instruction::Boundary if depth == 0 => {
                return true;
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Expression;
    use pretty_assertions::assert_eq;

    fn emit(value: &str) -> Instruction {
        Instruction::EmitStatic {
            value: value.to_string(),
        }
    }

    fn lower_with(instructions: &[Instruction], exprs: &[Expression], dialect: Dialect) -> SqlBuild {
        lower(instructions, &ExprRenderer::new(exprs), &Scope::new(), dialect).unwrap()
    }

    #[test]
    fn test_static_numbered_placeholders() {
        let exprs = vec![
            Expression::ident("a"),
            Expression::ident("b"),
            Expression::ident("c"),
        ];
        let insts = vec![
            emit("SELECT * FROM t WHERE a = "),
            Instruction::EmitEval { expr_index: 0 },
            emit(" AND b = ?"),
            Instruction::AddParam { expr_index: 1 },
            emit(" AND c = "),
            Instruction::AddParam { expr_index: 2 },
        ];
        let build = lower_with(&insts, &exprs, Dialect::Postgres);
        assert_eq!(
            build,
            SqlBuild::Static {
                sql: "SELECT * FROM t WHERE a = $1 AND b = $2 AND c = $3".to_string(),
                args: vec!["a".into(), "b".into(), "c".into()],
            }
        );
    }

    #[test]
    fn test_static_repeated_marker_dialects() {
        let exprs = vec![Expression::ident("name")];
        let insts = vec![
            emit("SELECT * FROM t WHERE name LIKE '%x' AND n = "),
            Instruction::EmitEval { expr_index: 0 },
        ];
        match lower_with(&insts, &exprs, Dialect::MySql) {
            SqlBuild::Static { sql, .. } => {
                assert_eq!(sql, "SELECT * FROM t WHERE name LIKE '%%x' AND n = %s")
            }
            other => panic!("expected static build, got {other:?}"),
        }
        match lower_with(&insts, &exprs, Dialect::Sqlite) {
            SqlBuild::Static { sql, .. } => {
                assert_eq!(sql, "SELECT * FROM t WHERE name LIKE '%x' AND n = ?")
            }
            other => panic!("expected static build, got {other:?}"),
        }
    }

    #[test]
    fn test_if_forces_dynamic() {
        let exprs = vec![Expression::ident("active")];
        let insts = vec![
            emit("SELECT * FROM t"),
            Instruction::If { expr_index: 0 },
            emit(" WHERE active"),
            Instruction::End,
        ];
        assert!(needs_dynamic(&insts));
        let build = lower_with(&insts, &exprs, Dialect::Sqlite);
        assert!(!build.is_static());
        assert_eq!(
            build.to_code().render(4),
            "# Build SQL dynamically\n\
             sql_parts = []\n\
             args = []\n\
             sql_parts.append('SELECT * FROM t')\n\
             if active:\n    sql_parts.append(' WHERE active')\n\
             \n\
             sql = ''.join(sql_parts)\n"
        );
    }

    #[test]
    fn test_else_if_chain_and_empty_branch() {
        let exprs = vec![Expression::ident("a"), Expression::ident("b")];
        let insts = vec![
            Instruction::If { expr_index: 0 },
            Instruction::ElseIf { expr_index: 1 },
            emit("x"),
            Instruction::Else,
            emit("y"),
            Instruction::End,
        ];
        let code = lower_with(&insts, &exprs, Dialect::Sqlite).to_code();
        let body: Vec<(usize, &str)> = code
            .lines()
            .iter()
            .skip(3)
            .map(|l| (l.indent, l.text.as_str()))
            .collect();
        assert_eq!(
            body,
            vec![
                (0, "if a:"),
                (1, "pass"),
                (0, "elif b:"),
                (1, "sql_parts.append('x')"),
                (0, "else:"),
                (1, "sql_parts.append('y')"),
                (0, ""),
                (0, "sql = ''.join(sql_parts)"),
            ]
        );
    }

    #[test]
    fn test_loop_binds_variable_and_suppresses_last_delimiter() {
        let exprs = vec![Expression::ident("ids"), Expression::ident("id")];
        let insts = vec![
            emit("DELETE FROM t WHERE id IN ("),
            Instruction::LoopStart {
                variable: "id".into(),
                collection_expr_index: 0,
            },
            Instruction::EmitEval { expr_index: 1 },
            Instruction::EmitUnlessBoundary { value: ", ".into() },
            Instruction::LoopEnd,
            emit(")"),
        ];
        let code = lower_with(&insts, &exprs, Dialect::Postgres).to_code();
        let rendered = code.render(4);
        assert!(rendered.contains("_loop_src_1 = ids\n"));
        assert!(rendered.contains("for id_1_idx, id_1 in enumerate(_loop_items_1):\n"));
        assert!(rendered.contains("    id_1_is_last = id_1_idx == len(_loop_items_1) - 1\n"));
        assert!(rendered.contains("    args.append(id_1)\n    sql_parts.append(f'${len(args)}')\n"));
        assert!(rendered.contains("    if not id_1_is_last:\n        sql_parts.append(', ')\n"));
        assert!(!rendered.contains("boundary_needed"));
    }

    #[test]
    fn test_boundary_flag_outside_loops() {
        let exprs = vec![Expression::ident("name"), Expression::ident("email")];
        let insts = vec![
            emit("UPDATE users SET "),
            Instruction::If { expr_index: 0 },
            emit("name = ?"),
            Instruction::AddParam { expr_index: 0 },
            Instruction::End,
            Instruction::EmitUnlessBoundary { value: ", ".into() },
            Instruction::If { expr_index: 1 },
            emit("email = ?"),
            Instruction::AddParam { expr_index: 1 },
            Instruction::End,
            Instruction::Boundary,
            emit(" WHERE id = 1"),
        ];
        let code = lower_with(&insts, &exprs, Dialect::Sqlite).to_code();
        let rendered = code.render(4);
        assert!(rendered.contains("boundary_needed = False\n"));
        assert!(rendered.contains("    sql_parts.append('name = ?')\n    boundary_needed = True\n"));
        assert!(rendered.contains("if boundary_needed:\n    sql_parts.append(', ')\n"));
    }

    #[test]
    fn test_dynamic_postgres_markers_number_at_run_time() {
        let exprs = vec![Expression::ident("a"), Expression::ident("b")];
        let insts = vec![
            Instruction::If { expr_index: 0 },
            emit("a = ? AND b = ? AND j = '{}'"),
            Instruction::AddParam { expr_index: 0 },
            Instruction::AddParam { expr_index: 1 },
            Instruction::End,
        ];
        let rendered = lower_with(&insts, &exprs, Dialect::Postgres).to_code().render(4);
        assert!(rendered.contains(
            r"sql_parts.append(f'a = ${len(args) + 1} AND b = ${len(args) + 2} AND j = \'{{}}\'')"
        ));
    }

    #[test]
    fn test_nested_loops_shadow_and_restore_variable() {
        let exprs = vec![
            Expression::ident("groups"),
            Expression::ident("g").member("items", false),
            Expression::ident("g"),
        ];
        let insts = vec![
            emit("("),
            Instruction::LoopStart {
                variable: "g".into(),
                collection_expr_index: 0,
            },
            Instruction::LoopStart {
                variable: "g".into(),
                collection_expr_index: 1,
            },
            Instruction::EmitEval { expr_index: 2 },
            Instruction::EmitUnlessBoundary { value: ", ".into() },
            Instruction::LoopEnd,
            Instruction::EmitEval { expr_index: 2 },
            Instruction::EmitUnlessBoundary { value: "; ".into() },
            Instruction::LoopEnd,
            emit(")"),
        ];
        let rendered = lower_with(&insts, &exprs, Dialect::Sqlite).to_code().render(4);
        assert_eq!(
            rendered,
            "# Build SQL dynamically
sql_parts = []
args = []
sql_parts.append('(')
_loop_src_1 = groups
_loop_items_1 = [] if _loop_src_1 is None else list(_loop_src_1) if isinstance(_loop_src_1, (list, tuple, set, frozenset)) else [_loop_src_1]
for g_1_idx, g_1 in enumerate(_loop_items_1):
    g_1_is_last = g_1_idx == len(_loop_items_1) - 1
    _loop_src_2 = g_1.items
    _loop_items_2 = [] if _loop_src_2 is None else list(_loop_src_2) if isinstance(_loop_src_2, (list, tuple, set, frozenset)) else [_loop_src_2]
    for g_2_idx, g_2 in enumerate(_loop_items_2):
        g_2_is_last = g_2_idx == len(_loop_items_2) - 1
        args.append(g_2)
        sql_parts.append('?')
        if not g_2_is_last:
            sql_parts.append(', ')
    args.append(g_1)
    sql_parts.append('?')
    if not g_1_is_last:
        sql_parts.append('; ')
sql_parts.append(')')

sql = ''.join(sql_parts)
"
        );
    }

    #[test]
    fn test_loop_end_cannot_close_if() {
        let exprs = vec![Expression::ident("ids"), Expression::ident("flag")];
        let insts = vec![
            Instruction::LoopStart {
                variable: "id".into(),
                collection_expr_index: 0,
            },
            Instruction::If { expr_index: 1 },
            emit("x"),
            Instruction::LoopEnd,
        ];
        let err = lower(&insts, &ExprRenderer::new(&exprs), &Scope::new(), Dialect::Sqlite).unwrap_err();
        assert!(matches!(err, GenError::ControlFlow(_)));
        assert!(err.to_string().contains("LOOP_END closes an IF block"));
    }

    fn interleaved_markers() -> Vec<Instruction> {
        vec![
            emit("a = ? AND b = "),
            Instruction::EmitEval { expr_index: 1 },
            emit(" AND c = ?"),
            Instruction::AddParam { expr_index: 0 },
            Instruction::AddParam { expr_index: 2 },
        ]
    }

    #[test]
    fn test_static_eval_between_marker_and_its_param() {
        let exprs = vec![Expression::ident("a"), Expression::ident("b"), Expression::ident("c")];
        let expected_args = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(
            lower_with(&interleaved_markers(), &exprs, Dialect::Postgres),
            SqlBuild::Static {
                sql: "a = $1 AND b = $2 AND c = $3".to_string(),
                args: expected_args.clone(),
            }
        );
        assert_eq!(
            lower_with(&interleaved_markers(), &exprs, Dialect::Sqlite),
            SqlBuild::Static {
                sql: "a = ? AND b = ? AND c = ?".to_string(),
                args: expected_args,
            }
        );
    }

    #[test]
    fn test_dynamic_eval_between_marker_and_its_param() {
        let exprs = vec![
            Expression::ident("a"),
            Expression::ident("b"),
            Expression::ident("c"),
            Expression::ident("on"),
        ];
        let mut insts = vec![Instruction::If { expr_index: 3 }];
        insts.extend(interleaved_markers());
        insts.push(Instruction::End);

        let rendered = lower_with(&insts, &exprs, Dialect::Postgres).to_code().render(4);
        assert!(rendered.contains(
            "if on:
    sql_parts.append(f'a = ${len(args) + 1} AND b = ')
    sql_parts.append(f'${len(args) + 2}')
    sql_parts.append(f' AND c = ${len(args) + 3}')
    args.append(a)
    args.append(b)
    args.append(c)
"
        ), "unexpected body:\n{rendered}");

        let rendered = lower_with(&insts, &exprs, Dialect::Sqlite).to_code().render(4);
        assert!(rendered.contains(
            "    sql_parts.append('?')
    sql_parts.append(' AND c = ?')
    args.append(a)
    args.append(b)
    args.append(c)
"
        ), "unexpected body:\n{rendered}");
    }

    #[test]
    fn test_stack_underflow_and_unclosed() {
        let exprs = vec![Expression::ident("a")];
        let err = lower(&[Instruction::End], &ExprRenderer::new(&exprs), &Scope::new(), Dialect::Sqlite)
            .unwrap_err();
        assert!(matches!(err, GenError::ControlFlow(_)));

        let err = lower(
            &[Instruction::If { expr_index: 0 }],
            &ExprRenderer::new(&exprs),
            &Scope::new(),
            Dialect::Sqlite,
        )
        .unwrap_err();
        assert!(err.to_string().contains("never closed"));
    }

    #[test]
    fn test_out_of_range_expression() {
        let err = lower(
            &[Instruction::EmitEval { expr_index: 4 }],
            &ExprRenderer::new(&[]),
            &Scope::new(),
            Dialect::Postgres,
        )
        .unwrap_err();
        assert!(matches!(err, GenError::ExpressionOutOfRange { index: 4, len: 0 }));
    }
}
