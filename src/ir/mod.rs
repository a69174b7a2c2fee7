//! Intermediate representation consumed by the generator.
//!
//! The IR is produced upstream (parser + optimizer) and arrives as JSON.
//! Everything here is a plain immutable snapshot; nothing in the code
//! generator mutates it.

mod expr;
mod instruction;
mod where_meta;

pub use expr::{Expression, Step};
pub use instruction::Instruction;
pub use where_meta::{DynamicCondition, RemovalLiteral, WhereMeta, WhereStatus};

use crate::error::{GenError, GenResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Declared result cardinality of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Affinity {
    #[default]
    None,
    One,
    Many,
}

impl FromStr for Affinity {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(Affinity::None),
            "one" => Ok(Affinity::One),
            "many" => Ok(Affinity::Many),
            other => Err(GenError::Config(format!(
                "unsupported response affinity: {}",
                other
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Affinity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Affinity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Affinity::None => write!(f, "none"),
            Affinity::One => write!(f, "one"),
            Affinity::Many => write!(f, "many"),
        }
    }
}

/// A declared function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub description: String,
}

/// A system column filled from the runtime context (created_at, updated_by, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplicitParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// One column of the response row.
///
/// A name containing `__` encodes a nested group path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, alias = "nullable")]
    pub is_nullable: bool,
}

impl ResponseField {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, is_nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            is_nullable,
        }
    }
}

/// The full IR snapshot for one generated function.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryIr {
    pub function_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_statement_type")]
    pub statement_type: String,
    #[serde(default)]
    pub response_affinity: Affinity,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub implicit_parameters: Vec<ImplicitParameter>,
    #[serde(default)]
    pub responses: Vec<ResponseField>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub expressions: Vec<Expression>,
    #[serde(default)]
    pub where_meta: Option<WhereMeta>,
}

fn default_statement_type() -> String {
    "select".to_string()
}

impl QueryIr {
    /// Create an empty IR for a function name.
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            statement_type: default_statement_type(),
            ..Default::default()
        }
    }

    /// Load IR from a JSON string.
    pub fn from_json(json: &str) -> GenResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load IR from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> GenResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn with_affinity(mut self, affinity: Affinity) -> Self {
        self.response_affinity = affinity;
        self
    }

    pub fn with_statement_type(mut self, statement_type: impl Into<String>) -> Self {
        self.statement_type = statement_type.into();
        self
    }

    pub fn with_responses(mut self, responses: Vec<ResponseField>) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_instructions(mut self, instructions: Vec<Instruction>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn with_expressions(mut self, expressions: Vec<Expression>) -> Self {
        self.expressions = expressions;
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_where_meta(mut self, meta: WhereMeta) -> Self {
        self.where_meta = Some(meta);
        self
    }
}
