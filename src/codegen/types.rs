//! IR type tags to Python type annotations.

use crate::error::{GenError, GenResult};
use std::collections::BTreeSet;

/// A Python type annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PyType {
    Int,
    Str,
    Bool,
    Float,
    Decimal,
    Datetime,
    Bytes,
    Any,
    List(Box<PyType>),
    Optional(Box<PyType>),
    /// A generated record type (dataclass) referenced by name.
    Record(String),
}

/// Supported type tags and the annotation each maps to, for `sqlpy types`.
pub const TYPE_TABLE: &[(&str, &str)] = &[
    ("int, int32, int64", "int"),
    ("string, text", "str"),
    ("bool, boolean", "bool"),
    ("float, float32, float64, double", "float"),
    ("decimal, numeric", "Decimal"),
    ("timestamp, date, time, datetime", "datetime"),
    ("bytes", "bytes"),
    ("any", "Any"),
    ("T[]", "List[T]"),
    ("nullable T", "Optional[T]"),
];

impl PyType {
    /// Parse a non-nullable type tag.
    pub fn parse(tag: &str) -> Option<PyType> {
        let tag = tag.trim();
        if let Some(inner) = tag.strip_suffix("[]") {
            return PyType::parse(inner).map(|t| PyType::List(Box::new(t)));
        }

        let ty = match tag.to_lowercase().as_str() {
            "int" | "int32" | "int64" => PyType::Int,
            "string" | "text" => PyType::Str,
            "bool" | "boolean" => PyType::Bool,
            "float" | "float32" | "float64" | "double" => PyType::Float,
            "decimal" | "numeric" => PyType::Decimal,
            "timestamp" | "date" | "time" | "datetime" => PyType::Datetime,
            "bytes" => PyType::Bytes,
            "any" => PyType::Any,
            _ => return None,
        };
        Some(ty)
    }

    /// Convert a type tag for `field`, wrapping nullable types in `Optional`.
    pub fn convert(
        field: &str,
        tag: &str,
        nullable: bool,
        context: &'static str,
    ) -> GenResult<PyType> {
        let ty = PyType::parse(tag)
            .ok_or_else(|| GenError::unsupported_type(field, tag, context))?;
        Ok(if nullable { ty.optional() } else { ty })
    }

    /// Wrap in `Optional[...]` unless already optional.
    pub fn optional(self) -> PyType {
        match self {
            PyType::Optional(_) => self,
            other => PyType::Optional(Box::new(other)),
        }
    }

    pub fn list_of(inner: PyType) -> PyType {
        PyType::List(Box::new(inner))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, PyType::Optional(_))
    }

    /// Collect the imports this annotation needs.
    fn collect_imports(&self, typing: &mut BTreeSet<&'static str>, stdlib: &mut BTreeSet<&'static str>) {
        match self {
            PyType::Decimal => {
                stdlib.insert("from decimal import Decimal");
            }
            PyType::Datetime => {
                stdlib.insert("from datetime import datetime");
            }
            PyType::Any => {
                typing.insert("Any");
            }
            PyType::List(inner) => {
                typing.insert("List");
                inner.collect_imports(typing, stdlib);
            }
            PyType::Optional(inner) => {
                typing.insert("Optional");
                inner.collect_imports(typing, stdlib);
            }
            PyType::Int | PyType::Str | PyType::Bool | PyType::Float | PyType::Bytes | PyType::Record(_) => {}
        }
    }
}

impl std::fmt::Display for PyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PyType::Int => write!(f, "int"),
            PyType::Str => write!(f, "str"),
            PyType::Bool => write!(f, "bool"),
            PyType::Float => write!(f, "float"),
            PyType::Decimal => write!(f, "Decimal"),
            PyType::Datetime => write!(f, "datetime"),
            PyType::Bytes => write!(f, "bytes"),
            PyType::Any => write!(f, "Any"),
            PyType::List(inner) => write!(f, "List[{}]", inner),
            PyType::Optional(inner) => write!(f, "Optional[{}]", inner),
            PyType::Record(name) => write!(f, "{}", name),
        }
    }
}

/// Names needed from `typing` and stdlib import lines needed by `types`.
pub fn import_names(types: &[PyType]) -> (BTreeSet<&'static str>, BTreeSet<&'static str>) {
    let mut typing = BTreeSet::new();
    let mut stdlib = BTreeSet::new();
    for ty in types {
        ty.collect_imports(&mut typing, &mut stdlib);
    }
    (typing, stdlib)
}

/// Import statements required by `types`, sorted and de-duplicated.
///
/// `typing` names are merged into one `from typing import ...` line.
pub fn required_imports(types: &[PyType]) -> BTreeSet<String> {
    let (typing, stdlib) = import_names(types);

    let mut imports: BTreeSet<String> = stdlib.into_iter().map(String::from).collect();
    if !typing.is_empty() {
        let names: Vec<&str> = typing.into_iter().collect();
        imports.insert(format!("from typing import {}", names.join(", ")));
    }
    imports
}
