//! Error types for sqlpy.

use thiserror::Error;

/// The main error type for code generation.
#[derive(Debug, Error)]
pub enum GenError {
    /// No target dialect was configured.
    #[error("Configuration error: dialect must be specified (postgres, mysql, sqlite)")]
    MissingDialect,

    /// The requested dialect has no driver idioms.
    #[error("Configuration error: unsupported dialect '{0}'. Expected: postgres, mysql, or sqlite")]
    UnsupportedDialect(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A field or parameter uses a type tag the normalizer does not know.
    #[error("{}", render_unsupported_type(.field, .type_name, .context, .hints))]
    UnsupportedType {
        field: String,
        type_name: String,
        context: &'static str,
        hints: Vec<&'static str>,
    },

    /// Hierarchical aggregation needs an `id` / `*_id` root column.
    #[error("Shape error in '{function}': no parent key field found for hierarchical aggregation (expected a root column named 'id' or ending in '_id')")]
    NoParentKey { function: String },

    #[error("Shape error in '{function}': response affinity '{affinity}' requires response fields")]
    MissingResponseSchema { function: String, affinity: String },

    #[error("Expression error: index {index} out of range ({len} expressions)")]
    ExpressionOutOfRange { index: usize, len: usize },

    #[error("Expression error: expression {0} has no steps")]
    EmptyExpression(usize),

    #[error("Expression error: expression {index}: {message}")]
    InvalidExpression { index: usize, message: String },

    /// Malformed control-flow nesting in the instruction stream.
    #[error("Control flow error: {0}")]
    ControlFlow(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

fn render_unsupported_type(
    field: &str,
    type_name: &str,
    context: &str,
    hints: &[&'static str],
) -> String {
    let mut msg = format!("unsupported {} type '{}' for '{}'", context, type_name, field);
    if let Some(first) = hints.first() {
        msg.push_str("\n\nHint: ");
        msg.push_str(first);
        if hints.len() > 1 {
            msg.push_str("\nFor more information, run `sqlpy types`");
        }
    }
    msg
}

impl GenError {
    /// Create an unsupported-type error with hints matching the context.
    pub fn unsupported_type(
        field: impl Into<String>,
        type_name: impl Into<String>,
        context: &'static str,
    ) -> Self {
        let hints = match context {
            "parameter" => vec![
                "Basic types: int, string, bool, float, decimal, timestamp (aliases: date, time, datetime), bytes, any",
                "Arrays: string[], int[], etc.",
            ],
            "response" => vec![
                "Supported types: int, string, bool, float, decimal, timestamp, bytes, any",
                "Arrays: append [] to a basic type; nullable columns become Optional[T]",
            ],
            _ => vec!["Supported basic types: int, int32, int64, string, bool, float, double, decimal, timestamp, date, time, datetime, bytes, any"],
        };
        Self::UnsupportedType {
            field: field.into(),
            type_name: type_name.into(),
            context,
            hints,
        }
    }

    /// Create a control flow error.
    pub fn control_flow(message: impl Into<String>) -> Self {
        Self::ControlFlow(message.into())
    }
}

/// Result type alias for sqlpy operations.
pub type GenResult<T> = Result<T, GenError>;
