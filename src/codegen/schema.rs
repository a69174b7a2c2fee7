//! Record schemas (Python dataclasses) for query results.

use super::code::Code;
use super::hierarchy::{self, Hierarchy, Node, ShapeField};
use super::naming::{child_class_name, generate_class_name, python_identifier};
use super::types::PyType;
use crate::error::GenResult;
use crate::ir::ResponseField;

/// Default value of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    None,
    EmptyList,
}

impl FieldDefault {
    pub fn literal(&self) -> &'static str {
        match self {
            FieldDefault::None => "None",
            FieldDefault::EmptyList => "field(default_factory=list)",
        }
    }
}

/// One field of a record schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub py_type: PyType,
    pub default: Option<FieldDefault>,
    /// Source column for scalar fields; `None` for child-group lists.
    pub column: Option<String>,
}

impl RecordField {
    fn scalar(field: &ShapeField) -> Self {
        Self {
            name: field.name.clone(),
            py_type: field.py_type.clone(),
            default: field.nullable.then_some(FieldDefault::None),
            column: Some(field.column.clone()),
        }
    }

    fn child_list(name: String, type_name: String) -> Self {
        Self {
            name,
            py_type: PyType::list_of(PyType::Record(type_name)),
            default: Some(FieldDefault::EmptyList),
            column: None,
        }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn is_child_list(&self) -> bool {
        self.column.is_none()
    }
}

/// A generated record type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub type_name: String,
    pub fields: Vec<RecordField>,
}

impl RecordSchema {
    /// Build a schema, moving defaulted fields after required ones (stable).
    pub fn new(type_name: impl Into<String>, fields: Vec<RecordField>) -> Self {
        let (mut ordered, optional): (Vec<_>, Vec<_>) =
            fields.into_iter().partition(|f| !f.has_default());
        ordered.extend(optional);
        Self {
            type_name: type_name.into(),
            fields: ordered,
        }
    }

    /// `@dataclass` definition.
    pub fn to_code(&self) -> Code {
        let mut code = Code::new();
        code.line("@dataclass");
        code.open(format!("class {}:", self.type_name));
        if self.fields.is_empty() {
            code.line("pass");
        }
        for field in &self.fields {
            match field.default {
                Some(default) => {
                    code.line(format!("{}: {} = {}", field.name, field.py_type, default.literal()))
                }
                None => code.line(format!("{}: {}", field.name, field.py_type)),
            };
        }
        code.dedent();
        code
    }
}

/// Every record type needed by one function, in dependency order.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSet {
    /// Child types before the types that reference them; the main type is last.
    pub records: Vec<RecordSchema>,
    pub main: String,
}

impl SchemaSet {
    pub fn main_record(&self) -> Option<&RecordSchema> {
        self.records.iter().find(|r| r.type_name == self.main)
    }

    pub fn get(&self, type_name: &str) -> Option<&RecordSchema> {
        self.records.iter().find(|r| r.type_name == type_name)
    }

    /// Every field annotation, for import computation.
    pub fn annotations(&self) -> Vec<PyType> {
        self.records
            .iter()
            .flat_map(|r| r.fields.iter().map(|f| f.py_type.clone()))
            .collect()
    }

    pub fn uses_child_lists(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.fields.iter().any(RecordField::is_child_list))
    }
}

/// Type name for the group at `node`.
pub fn node_type_name(main: &str, node: &Node) -> String {
    child_class_name(main, &node.path)
}

/// Build the schemas of a hierarchical response. `None` when there are no groups.
pub fn build_hierarchical(function_name: &str, hierarchy: &Hierarchy) -> Option<SchemaSet> {
    if hierarchy.is_empty() {
        return None;
    }

    let main = generate_class_name(function_name);
    let mut records = Vec::with_capacity(hierarchy.nodes.len() + 1);

    for node in hierarchy.depth_ordered() {
        let mut fields: Vec<RecordField> = node.fields.iter().map(RecordField::scalar).collect();
        for child in hierarchy.children_of(node) {
            fields.push(RecordField::child_list(
                child.attr_name(),
                node_type_name(&main, child),
            ));
        }
        records.push(RecordSchema::new(node_type_name(&main, node), fields));
    }

    let mut main_fields: Vec<RecordField> =
        hierarchy.root_fields.iter().map(RecordField::scalar).collect();
    for node in hierarchy.top_level() {
        main_fields.push(RecordField::child_list(
            node.attr_name(),
            node_type_name(&main, node),
        ));
    }
    records.push(RecordSchema::new(main.clone(), main_fields));

    Some(SchemaSet { records, main })
}

/// Build the single schema of a flat response.
pub fn build_flat(function_name: &str, responses: &[ResponseField]) -> GenResult<SchemaSet> {
    let main = generate_class_name(function_name);
    let fields = responses
        .iter()
        .map(|r| {
            Ok(RecordField {
                name: python_identifier(&r.name),
                py_type: PyType::convert(&r.name, &r.type_name, r.is_nullable, "response")?,
                default: r.is_nullable.then_some(FieldDefault::None),
                column: Some(r.name.clone()),
            })
        })
        .collect::<GenResult<Vec<_>>>()?;

    Ok(SchemaSet {
        records: vec![RecordSchema::new(main.clone(), fields)],
        main,
    })
}

/// Build schemas for any response. `None` when the query returns no columns.
pub fn build(function_name: &str, responses: &[ResponseField]) -> GenResult<Option<SchemaSet>> {
    if responses.is_empty() {
        return Ok(None);
    }
    if hierarchy::is_hierarchical(responses) {
        let shape = hierarchy::detect(responses)?;
        if let Some(set) = build_hierarchical(function_name, &shape) {
            return Ok(Some(set));
        }
    }
    build_flat(function_name, responses).map(Some)
}
