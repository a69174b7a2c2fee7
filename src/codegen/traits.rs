//! Driver traits: per-dialect execution idioms for generated code.

use super::code::Code;

/// Trait for dialect-specific driver code generation.
///
/// Every emitting method writes at the current indentation level of
/// `code`. The built SQL is always bound to `sql` and arguments to `args`.
pub trait Driver: Send + Sync {
    /// Python package the generated code talks to (e.g. `asyncpg`).
    fn package(&self) -> &'static str;

    /// Generate the parameter placeholder (e.g. `$1`, `%s`, `?`) for a 1-based index.
    fn placeholder(&self, index: usize) -> String;

    /// Whether placeholders carry their position, so dynamic SQL must
    /// number them at run time.
    fn numbered_placeholders(&self) -> bool {
        false
    }

    /// Escape literal SQL text so the driver's parameter substitution leaves it intact.
    fn escape_literal(&self, text: &str) -> String {
        text.to_string()
    }

    /// Name of the first positional parameter of generated functions.
    fn connection_param(&self) -> &'static str {
        "cursor"
    }

    /// Type annotation of the connection parameter.
    fn connection_annotation(&self) -> &'static str;

    /// Imports needed only for annotations (placed under `TYPE_CHECKING`).
    fn type_checking_imports(&self) -> &'static [&'static str] {
        &[]
    }

    /// Execute without fetching and `return` the affected-row count.
    fn emit_execute(&self, code: &mut Code);

    /// Execute and bind the first row (or `None`) to `row`.
    fn emit_fetch_one(&self, code: &mut Code);

    /// Execute and bind every row to `rows`.
    fn emit_fetch_all(&self, code: &mut Code);

    /// Execute and run `body` once per row bound to `row`, one row at a time.
    fn emit_stream(&self, code: &mut Code, body: Code);

    /// Python expression turning `row` into a plain dict.
    fn row_dict(&self) -> &'static str {
        "row if isinstance(row, dict) else dict(row)"
    }
}
