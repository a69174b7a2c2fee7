use crate::codegen::code::Code;
use crate::codegen::traits::Driver;

/// asyncpg driver.
pub struct AsyncpgDriver;

impl Driver for AsyncpgDriver {
    fn package(&self) -> &'static str {
        "asyncpg"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn numbered_placeholders(&self) -> bool {
        true
    }

    fn connection_param(&self) -> &'static str {
        "conn"
    }

    fn connection_annotation(&self) -> &'static str {
        "asyncpg.Connection"
    }

    fn type_checking_imports(&self) -> &'static [&'static str] {
        &["import asyncpg"]
    }

    fn emit_execute(&self, code: &mut Code) {
        code.line("status = await conn.execute(sql, *args)");
        // status tags look like 'INSERT 0 1' or 'UPDATE 3'
        code.line("parts = status.split() if isinstance(status, str) else []");
        code.open("if parts and parts[0] == 'INSERT':");
        code.line("affected_rows = int(parts[-1]) if len(parts) > 2 else 0");
        code.dedent();
        code.open("elif len(parts) > 1 and parts[-1].isdigit():");
        code.line("affected_rows = int(parts[-1])");
        code.dedent();
        code.open("else:");
        code.line("affected_rows = 0");
        code.dedent();
        code.line("return affected_rows");
    }

    fn emit_fetch_one(&self, code: &mut Code) {
        code.line("row = await conn.fetchrow(sql, *args)");
    }

    fn emit_fetch_all(&self, code: &mut Code) {
        code.line("rows = await conn.fetch(sql, *args)");
    }

    fn emit_stream(&self, code: &mut Code, body: Code) {
        // asyncpg cursors only work inside a transaction
        code.open("async with conn.transaction():");
        code.open("async for row in conn.cursor(sql, *args):");
        code.extend_nested(body);
        code.dedent().dedent();
    }

    fn row_dict(&self) -> &'static str {
        "dict(row)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_placeholders() {
        let driver = AsyncpgDriver;
        assert_eq!(driver.placeholder(1), "$1");
        assert_eq!(driver.placeholder(12), "$12");
        assert!(driver.numbered_placeholders());
    }

    #[test]
    fn test_stream_wraps_in_transaction() {
        let mut body = Code::new();
        body.line("yield row");
        let mut code = Code::new();
        AsyncpgDriver.emit_stream(&mut code, body);
        assert_eq!(
            code.render(4),
            "async with conn.transaction():\n    async for row in conn.cursor(sql, *args):\n        yield row\n"
        );
        assert_eq!(code.level(), 0);
    }
}
