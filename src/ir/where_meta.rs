use serde::{Deserialize, Serialize};

/// How a mutation's WHERE clause behaves, independent of runtime values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhereStatus {
    /// No WHERE clause at all.
    #[serde(alias = "full_scan")]
    Fullscan,
    /// Always at least one predicate.
    Exists,
    /// May disappear depending on template conditions.
    Conditional,
}

/// WHERE-clause safety metadata attached to UPDATE/DELETE statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereMeta {
    pub status: WhereStatus,
    #[serde(default)]
    pub dynamic_conditions: Vec<DynamicCondition>,
    /// Each inner list is one combination of literals that strips the WHERE clause.
    #[serde(default)]
    pub removal_combos: Vec<Vec<RemovalLiteral>>,
}

/// A conditional or loop construct that can remove the WHERE clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicCondition {
    pub expr_index: usize,
    #[serde(default)]
    pub negated_when_empty: bool,
    #[serde(default)]
    pub has_else: bool,
    #[serde(default)]
    pub description: String,
}

/// A single boolean requirement inside a removal combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalLiteral {
    pub expr_index: usize,
    pub when: bool,
}

impl WhereMeta {
    pub fn fullscan() -> Self {
        Self {
            status: WhereStatus::Fullscan,
            dynamic_conditions: Vec::new(),
            removal_combos: Vec::new(),
        }
    }
}
