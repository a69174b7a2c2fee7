//! Query execution synthesis: driver calls, row mapping and hierarchical aggregation.

use super::code::{py_str, Code};
use super::hierarchy::{find_parent_key_fields, Hierarchy};
use super::schema::{node_type_name, RecordSchema, SchemaSet};
use super::traits::Driver;
use super::Dialect;
use crate::error::{GenError, GenResult};
use crate::ir::Affinity;
use tracing::debug;

/// Everything the execution synthesizer needs for one function.
#[derive(Debug, Clone, Copy)]
pub struct ExecRequest<'a> {
    pub function_name: &'a str,
    pub affinity: Affinity,
    pub dialect: Dialect,
    pub schemas: Option<&'a SchemaSet>,
    /// Present and non-empty for hierarchical responses.
    pub hierarchy: Option<&'a Hierarchy>,
    /// Python names of the function parameters, reported on not-found errors.
    pub params: &'a [String],
}

impl<'a> ExecRequest<'a> {
    pub fn new(function_name: &'a str, affinity: Affinity, dialect: Dialect) -> Self {
        Self {
            function_name,
            affinity,
            dialect,
            schemas: None,
            hierarchy: None,
            params: &[],
        }
    }

    pub fn with_schemas(mut self, schemas: Option<&'a SchemaSet>) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn with_hierarchy(mut self, hierarchy: Option<&'a Hierarchy>) -> Self {
        self.hierarchy = hierarchy.filter(|h| !h.is_empty());
        self
    }

    pub fn with_params(mut self, params: &'a [String]) -> Self {
        self.params = params;
        self
    }
}

/// Return annotation of the generated function.
pub fn return_annotation(affinity: Affinity, schemas: Option<&SchemaSet>) -> String {
    match (affinity, schemas) {
        (Affinity::None, _) | (_, None) => "int".to_string(),
        (Affinity::One, Some(set)) => set.main.clone(),
        (Affinity::Many, Some(set)) => format!("AsyncGenerator[{}, None]", set.main),
    }
}

/// Emit the execution body for `request`.
pub fn synthesize(request: &ExecRequest<'_>) -> GenResult<Code> {
    let driver = request.dialect.driver();
    let mut code = Code::new();

    if request.affinity == Affinity::None {
        code.comment("Execute query (no result expected)");
        driver.emit_execute(&mut code);
        return Ok(code);
    }

    let schemas = request.schemas.ok_or_else(|| GenError::MissingResponseSchema {
        function: request.function_name.to_string(),
        affinity: request.affinity.to_string(),
    })?;
    let main = schemas
        .main_record()
        .ok_or_else(|| GenError::MissingResponseSchema {
            function: request.function_name.to_string(),
            affinity: request.affinity.to_string(),
        })?;

    debug!(
        function = request.function_name,
        affinity = %request.affinity,
        hierarchical = request.hierarchy.is_some(),
        "synthesizing query execution"
    );

    match (request.affinity, request.hierarchy) {
        (Affinity::One, None) => one_flat(&mut code, driver.as_ref(), request, main),
        (Affinity::Many, None) => many_flat(&mut code, driver.as_ref(), main),
        (Affinity::One, Some(h)) => one_hierarchical(&mut code, driver.as_ref(), request, schemas, h)?,
        (Affinity::Many, Some(h)) => many_hierarchical(&mut code, driver.as_ref(), request, schemas, h)?,
        (Affinity::None, _) => {}
    }
    Ok(code)
}

fn one_flat(code: &mut Code, driver: &dyn Driver, request: &ExecRequest<'_>, main: &RecordSchema) {
    code.comment("Execute query and fetch single row");
    driver.emit_fetch_one(code);
    code.open("if row is None:");
    raise_not_found(code, request);
    code.dedent();
    code.line(format!("row_dict = {}", driver.row_dict()));
    construct(code, "return ", main);
}

fn many_flat(code: &mut Code, driver: &dyn Driver, main: &RecordSchema) {
    code.comment("Execute query and yield rows one at a time");
    let mut body = Code::new();
    body.line(format!("row_dict = {}", driver.row_dict()));
    construct(&mut body, "yield ", main);
    driver.emit_stream(code, body);
}

fn one_hierarchical(
    code: &mut Code,
    driver: &dyn Driver,
    request: &ExecRequest<'_>,
    schemas: &SchemaSet,
    hierarchy: &Hierarchy,
) -> GenResult<()> {
    require_parent_key(request, hierarchy)?;
    let main = main_record(request, schemas)?;

    code.comment("Fetch every row and fold them into a single parent object");
    driver.emit_fetch_all(code);
    code.open("if not rows:");
    raise_not_found(code, request);
    code.dedent();
    code.line("result = None");
    code.open("for row in rows:");
    code.line(format!("row_dict = {}", driver.row_dict()));
    code.open("if result is None:");
    construct(code, "result = ", main);
    code.dedent();
    attach_children(code, "result", schemas, hierarchy)?;
    code.dedent();
    code.line("return result");
    Ok(())
}

fn many_hierarchical(
    code: &mut Code,
    driver: &dyn Driver,
    request: &ExecRequest<'_>,
    schemas: &SchemaSet,
    hierarchy: &Hierarchy,
) -> GenResult<()> {
    let key = require_parent_key(request, hierarchy)?;
    let main = main_record(request, schemas)?;

    code.comment("Rows must be ordered by the parent key; one parent is held at a time");
    code.line("current = None");
    code.line("current_key = None");

    let mut body = Code::new();
    body.line(format!("row_dict = {}", driver.row_dict()));
    body.line(format!("parent_key = row_dict.get({})", py_str(&key)));
    body.open("if current is None or parent_key != current_key:");
    body.open("if current is not None:");
    body.line("yield current");
    body.dedent();
    construct(&mut body, "current = ", main);
    body.line("current_key = parent_key");
    body.dedent();
    attach_children(&mut body, "current", schemas, hierarchy)?;

    driver.emit_stream(code, body);
    code.open("if current is not None:");
    code.line("yield current");
    code.dedent();
    Ok(())
}

fn main_record<'s>(request: &ExecRequest<'_>, schemas: &'s SchemaSet) -> GenResult<&'s RecordSchema> {
    schemas
        .main_record()
        .ok_or_else(|| GenError::MissingResponseSchema {
            function: request.function_name.to_string(),
            affinity: request.affinity.to_string(),
        })
}

/// Source column of the parent key, or a shape error.
fn require_parent_key(request: &ExecRequest<'_>, hierarchy: &Hierarchy) -> GenResult<String> {
    find_parent_key_fields(&hierarchy.root_fields)
        .first()
        .map(|f| f.column.clone())
        .ok_or_else(|| GenError::NoParentKey {
            function: request.function_name.to_string(),
        })
}

/// Append present top-level child groups of the current row to `target`.
fn attach_children(
    code: &mut Code,
    target: &str,
    schemas: &SchemaSet,
    hierarchy: &Hierarchy,
) -> GenResult<()> {
    for node in hierarchy.top_level() {
        if node.fields.is_empty() {
            continue;
        }
        let type_name = node_type_name(&schemas.main, node);
        let record = schemas
            .get(&type_name)
            .ok_or_else(|| GenError::Config(format!("missing record type {}", type_name)))?;

        let presence = node
            .fields
            .iter()
            .map(|f| format!("row_dict.get({}) is not None", py_str(&f.column)))
            .collect::<Vec<_>>()
            .join(" or ");
        code.open(format!("if {}:", presence));
        construct(code, "child = ", record);
        code.line(format!("{}.{}.append(child)", target, node.attr_name()));
        code.dedent();
    }
    Ok(())
}

/// Emit `<head>Type(field=..., ...)` mapping columns from `row_dict`.
fn construct(code: &mut Code, head: &str, record: &RecordSchema) {
    if record.fields.is_empty() {
        code.line(format!("{}{}()", head, record.type_name));
        return;
    }
    code.open(format!("{}{}(", head, record.type_name));
    for field in &record.fields {
        match &field.column {
            Some(column) => code.line(format!("{}=row_dict.get({}),", field.name, py_str(column))),
            None => code.line(format!("{}=[],", field.name)),
        };
    }
    code.dedent();
    code.line(")");
}

fn raise_not_found(code: &mut Code, request: &ExecRequest<'_>) {
    let params = request
        .params
        .iter()
        .map(|p| format!("{}: {}", py_str(p), p))
        .collect::<Vec<_>>()
        .join(", ");
    code.open("raise NotFoundError(");
    code.line("message='Record not found',");
    code.line(format!("func_name={},", py_str(request.function_name)));
    code.line("query=sql,");
    code.line(format!("params={{{}}},", params));
    code.dedent();
    code.line(")");
}
