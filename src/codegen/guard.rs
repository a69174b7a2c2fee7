//! Runtime guards against UPDATE/DELETE statements whose WHERE clause can vanish.

use super::code::{py_str, Code};
use super::expr::{ExprRenderer, Scope};
use crate::error::GenResult;
use crate::ir::{DynamicCondition, WhereMeta, WhereStatus};
use tracing::debug;

const UNCONDITIONAL: &str = "True";

/// Statement kinds that are guarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Update,
    Delete,
}

impl MutationKind {
    pub fn from_statement(statement_type: &str) -> Option<Self> {
        match statement_type.trim().to_lowercase().as_str() {
            "update" => Some(MutationKind::Update),
            "delete" => Some(MutationKind::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One guard: raise when `condition` holds at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub condition: String,
    pub hint: String,
}

impl Guard {
    pub fn is_unconditional(&self) -> bool {
        self.condition == UNCONDITIONAL
    }
}

/// Collect guards from WHERE metadata, de-duplicated by condition text.
pub fn collect_guards(
    meta: &WhereMeta,
    renderer: &ExprRenderer<'_>,
    scope: &Scope,
) -> GenResult<Vec<Guard>> {
    let mut guards: Vec<Guard> = Vec::new();
    let mut push = |guard: Guard| {
        if !guards.iter().any(|g| g.condition == guard.condition) {
            guards.push(guard);
        }
    };

    if meta.status == WhereStatus::Fullscan {
        push(Guard {
            condition: UNCONDITIONAL.to_string(),
            hint: "statement has no WHERE clause".to_string(),
        });
    }

    for cond in meta.dynamic_conditions.iter().filter(|c| !c.has_else) {
        let condition = renderer.render_condition(cond.expr_index, scope, cond.negated_when_empty)?;
        let label = if cond.description.is_empty() {
            condition.clone()
        } else {
            format!("{} ({})", condition, cond.description)
        };
        push(Guard {
            condition,
            hint: format!("WHERE clause is removed when {}", label),
        });
    }

    for combo in &meta.removal_combos {
        let condition = if combo.is_empty() {
            UNCONDITIONAL.to_string()
        } else {
            combo
                .iter()
                .map(|lit| renderer.render_condition(lit.expr_index, scope, !lit.when))
                .collect::<GenResult<Vec<_>>>()?
                .join(" and ")
        };
        let hint = if condition == UNCONDITIONAL {
            "WHERE clause is always removed".to_string()
        } else {
            format!("WHERE clause is removed when {}", condition)
        };
        push(Guard { condition, hint });
    }

    Ok(guards)
}

/// Emit the guard block, or `None` when nothing needs guarding.
pub fn synthesize(
    function_name: &str,
    kind: Option<MutationKind>,
    meta: Option<&WhereMeta>,
    renderer: &ExprRenderer<'_>,
    scope: &Scope,
) -> GenResult<Option<Code>> {
    let (Some(kind), Some(meta)) = (kind, meta) else {
        return Ok(None);
    };

    let guards = collect_guards(meta, renderer, scope)?;
    debug!(
        function = function_name,
        kind = %kind,
        guards = guards.len(),
        removable = %describe_dynamic_conditions(&meta.dynamic_conditions, true),
        "mutation guards"
    );
    if guards.is_empty() {
        return Ok(None);
    }

    let mut code = Code::new();
    code.comment(format!(
        "Refuse {} without an effective WHERE clause",
        kind.as_str().to_uppercase()
    ));
    code.open("if not ctx.allow_unsafe_mutations:");
    for guard in &guards {
        if guard.is_unconditional() {
            raise_unsafe(&mut code, function_name, kind, guard);
        } else {
            code.open(format!("if {}:", guard.condition));
            raise_unsafe(&mut code, function_name, kind, guard);
            code.dedent();
        }
    }
    code.dedent();
    Ok(Some(code))
}

fn raise_unsafe(code: &mut Code, function_name: &str, kind: MutationKind, guard: &Guard) {
    code.open("raise UnsafeQueryError(");
    code.line(format!(
        "message={},",
        py_str(&format!(
            "{} without an effective WHERE clause is not allowed",
            kind.as_str().to_uppercase()
        ))
    ));
    code.line(format!("func_name={},", py_str(function_name)));
    code.line("query=sql,");
    code.line(format!("hint={},", py_str(&guard.hint)));
    code.line(format!("mutation_kind={},", py_str(kind.as_str())));
    code.dedent();
    code.line(")");
}

/// `expr[i] description` labels, comma-joined.
///
/// With `only_removable`, conditions that keep the WHERE clause (not
/// negated-when-empty, or with an else branch) are skipped.
pub fn describe_dynamic_conditions(conds: &[DynamicCondition], only_removable: bool) -> String {
    conds
        .iter()
        .filter(|c| !only_removable || (c.negated_when_empty && !c.has_else))
        .map(|c| {
            if c.description.is_empty() {
                format!("expr[{}]", c.expr_index)
            } else {
                format!("expr[{}] {}", c.expr_index, c.description)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
