use super::{cursor_execute, cursor_stream};
use crate::codegen::code::Code;
use crate::codegen::traits::Driver;

/// aiomysql driver.
pub struct AiomysqlDriver;

impl Driver for AiomysqlDriver {
    fn package(&self) -> &'static str {
        "aiomysql"
    }

    fn placeholder(&self, _index: usize) -> String {
        "%s".to_string()
    }

    /// aiomysql always %-formats the query when args are passed.
    fn escape_literal(&self, text: &str) -> String {
        text.replace('%', "%%")
    }

    fn connection_annotation(&self) -> &'static str {
        "Any"
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
