//! Driver implementations, one per dialect.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::AiomysqlDriver;
pub use postgres::AsyncpgDriver;
pub use sqlite::AiosqliteDriver;

use super::code::Code;

/// Shared DB-API style execution used by aiomysql and aiosqlite.
pub(crate) fn cursor_execute(code: &mut Code) {
    code.line("await cursor.execute(sql, args)");
}

pub(crate) fn cursor_stream(code: &mut Code, body: Code) {
    cursor_execute(code);
    code.open("async for row in cursor:");
    code.extend_nested(body);
    code.dedent();
}
