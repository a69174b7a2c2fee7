//! # sqlpy
//!
//! Lowers an optimized, dialect-neutral SQL intermediate representation
//! into async Python query functions (asyncpg, aiomysql, aiosqlite).
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use sqlpy::prelude::*;
//!
//! let ir = QueryIr::from_path("queries/get_user_by_id.json")?;
//! let config = GeneratorConfig::builder().dialect("postgres").build();
//!
//! let module = Generator::new(&ir, &config).generate()?;
//! std::fs::write(&module.file_name, module.render())?;
//! ```
//!
//! ## Pipeline
//!
//! | Stage            | Module               | Output                          |
//! |------------------|----------------------|---------------------------------|
//! | Normalize        | `codegen::naming`    | Python names and annotations    |
//! | Shape            | `codegen::hierarchy` | nested groups from `a__b` names |
//! | Schema           | `codegen::schema`    | dataclasses, children first     |
//! | Lower            | `codegen::sql`       | static SQL or SQL-building code |
//! | Execute          | `codegen::execution` | driver calls and row mapping    |
//! | Guard            | `codegen::guard`     | unsafe UPDATE/DELETE checks     |

pub mod codegen;
pub mod config;
pub mod error;
pub mod ir;

pub mod prelude {
    pub use crate::codegen::{
        Code, Dialect, GeneratedModule, GenerationOutput, Generator, SqlBuild,
    };
    pub use crate::config::GeneratorConfig;
    pub use crate::error::*;
    pub use crate::ir::{Affinity, Expression, Instruction, QueryIr, ResponseField, WhereMeta};
}

/// Generate a Python module from an IR JSON document.
///
/// # Example
///
/// ```
/// use sqlpy::prelude::*;
///
/// let json = r#"{
///     "function_name": "list_user_ids",
///     "instructions": [{"op": "EMIT_STATIC", "value": "SELECT id FROM users"}]
/// }"#;
/// let config = GeneratorConfig::builder().dialect("sqlite").build();
/// let module = sqlpy::generate_from_json(json, &config).unwrap();
/// assert!(module.render().contains("async def list_user_ids("));
/// ```
pub fn generate_from_json(
    json: &str,
    config: &config::GeneratorConfig,
) -> Result<codegen::GeneratedModule, error::GenError> {
    let ir = ir::QueryIr::from_json(json)?;
    codegen::Generator::new(&ir, config).generate()
}
