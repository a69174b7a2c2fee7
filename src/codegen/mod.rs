//! Python code generation for optimized SQL IR.
//!
//! Converts one IR snapshot into an async Python query function.

pub mod code;
pub mod dialect;
pub mod driver;
pub mod execution;
pub mod expr;
pub mod guard;
pub mod hierarchy;
pub mod module;
pub mod naming;
pub mod params;
pub mod schema;
pub mod sql;
pub mod traits;
pub mod types;

#[cfg(test)]
mod tests;

pub use code::{Code, Line};
pub use dialect::Dialect;
pub use execution::ExecRequest;
pub use expr::{ExprRenderer, Scope};
pub use guard::MutationKind;
pub use hierarchy::Hierarchy;
pub use module::{GeneratedModule, GenerationOutput, Generator};
pub use naming::generate_class_name;
pub use schema::{RecordSchema, SchemaSet};
pub use sql::SqlBuild;
pub use traits::Driver;
pub use types::PyType;
