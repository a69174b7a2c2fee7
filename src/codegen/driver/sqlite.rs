use super::{cursor_execute, cursor_stream};
use crate::codegen::code::Code;
use crate::codegen::traits::Driver;

/// aiosqlite driver.
pub struct AiosqliteDriver;

impl Driver for AiosqliteDriver {
    fn package(&self) -> &'static str {
        "aiosqlite"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn connection_annotation(&self) -> &'static str {
        "aiosqlite.Cursor"
    }

    fn type_checking_imports(&self) -> &'static [&'static str] {
        &["import aiosqlite"]
    }

    fn emit_execute(&self, code: &mut Code) {
        cursor_execute(code);
        code.line("return cursor.rowcount");
    }

    fn emit_fetch_one(&self, code: &mut Code) {
        cursor_execute(code);
        code.line("row = await cursor.fetchone()");
    }

    fn emit_fetch_all(&self, code: &mut Code) {
        cursor_execute(code);
        code.line("rows = await cursor.fetchall()");
    }

    fn emit_stream(&self, code: &mut Code, body: Code) {
        cursor_stream(code, body);
    }
}
