//! Code generation scenario tests.
//!
//! Tests are organized by category:
//! - `dialects`: one IR rendered for asyncpg, aiomysql and aiosqlite
//! - `hierarchical`: nested response groups, aggregation and streaming
//! - `mutations`: dynamic UPDATE/DELETE statements, system values and guards

mod mutations;

use crate::config::GeneratorConfig;
use crate::ir::QueryIr;

use super::{Dialect, GenerationOutput, Generator};

/// Render `ir` for `dialect` with default settings.
fn render(ir: &QueryIr, dialect: Dialect) -> String {
    let config = GeneratorConfig::builder().dialect(dialect.name()).build();
    Generator::new(ir, &config).generate().unwrap().render()
}

fn output(ir: &QueryIr, dialect: Dialect) -> GenerationOutput {
    let config = GeneratorConfig::builder().dialect(dialect.name()).build();
    Generator::new(ir, &config).generate_output().unwrap()
}
