//! Function signature, parameter validation and system-value resolution.

use super::code::{py_str, Code};
use super::naming::{param_identifier, to_snake_case};
use super::traits::Driver;
use super::types::PyType;
use crate::error::GenResult;
use crate::ir::{Instruction, QueryIr};
use serde_json::Value;

/// A declared parameter of the generated function.
#[derive(Debug, Clone, PartialEq)]
pub struct PyParam {
    pub name: String,
    pub py_type: PyType,
    pub optional: bool,
    pub description: String,
}

/// A keyword-only system parameter resolved from the runtime context.
#[derive(Debug, Clone, PartialEq)]
pub struct ImplicitParam {
    pub name: String,
    /// Key passed to `ctx.get_system_value`.
    pub system_name: String,
    pub py_type: PyType,
    /// Python expression used when neither caller nor context supply a value.
    pub default: Option<String>,
}

/// Ordered parameters of one generated function.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub connection: &'static str,
    pub connection_annotation: &'static str,
    /// Required parameters first, then optional ones.
    pub params: Vec<PyParam>,
    pub implicit: Vec<ImplicitParam>,
}

/// Build the signature for `ir`.
pub fn build_signature(ir: &QueryIr, driver: &dyn Driver) -> GenResult<Signature> {
    let mut required = Vec::new();
    let mut optional = Vec::new();
    for param in &ir.parameters {
        let py_type = PyType::convert(&param.name, &param.type_name, param.optional, "parameter")?;
        let converted = PyParam {
            name: param_identifier(&param.name),
            py_type,
            optional: param.optional,
            description: param.description.clone(),
        };
        if param.optional {
            optional.push(converted);
        } else {
            required.push(converted);
        }
    }
    required.extend(optional);

    let mut implicit = Vec::new();
    for param in &ir.implicit_parameters {
        implicit.push(ImplicitParam {
            name: param_identifier(&param.name),
            system_name: to_snake_case(&param.name),
            py_type: PyType::convert(&param.name, &param.type_name, true, "parameter")?,
            default: param.default.as_ref().map(format_default_value),
        });
    }

    // System fields the SQL binds without a declaration still need a local.
    for field in collect_system_fields(&ir.instructions) {
        let name = param_identifier(&field);
        if implicit.iter().any(|p| p.name == name) || required.iter().any(|p| p.name == name) {
            continue;
        }
        implicit.push(ImplicitParam {
            name,
            system_name: to_snake_case(&field),
            py_type: PyType::Any.optional(),
            default: None,
        });
    }

    Ok(Signature {
        connection: driver.connection_param(),
        connection_annotation: driver.connection_annotation(),
        params: required,
        implicit,
    })
}

/// System fields referenced by `ADD_SYSTEM_PARAM`, first occurrence order.
pub fn collect_system_fields(instructions: &[Instruction]) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for inst in instructions {
        if let Instruction::AddSystemParam { system_field } = inst
            && !fields.contains(system_field)
        {
            fields.push(system_field.clone());
        }
    }
    fields
}

/// Format an IR default literal as Python.
///
/// Strings that look like code (contain `(` or `.`) are used verbatim.
pub fn format_default_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.contains('(') || s.contains('.') => s.clone(),
        Value::String(s) => py_str(s),
        other => other.to_string(),
    }
}

impl Signature {
    /// `async def` header spanning several lines.
    pub fn render_def(&self, function_name: &str, return_annotation: &str) -> Code {
        let mut code = Code::new();
        code.open(format!("async def {}(", function_name));
        code.line(format!("{}: {},", self.connection, self.connection_annotation));
        for param in &self.params {
            if param.optional {
                code.line(format!("{}: {} = None,", param.name, param.py_type));
            } else {
                code.line(format!("{}: {},", param.name, param.py_type));
            }
        }
        if !self.implicit.is_empty() {
            code.line("*,");
            for param in &self.implicit {
                code.line(format!("{}: {} = None,", param.name, param.py_type));
            }
        }
        code.dedent();
        code.line(format!(") -> {}:", return_annotation));
        code
    }

    /// Validation statements for required parameters.
    pub fn validations(&self, function_name: &str) -> Code {
        let mut code = Code::new();
        for param in self.params.iter().filter(|p| !p.optional) {
            code.open(format!("if {} is None:", param.name));
            code.open("raise ValidationError(");
            code.line(format!(
                "message={},",
                py_str(&format!("Required parameter '{}' cannot be None", param.name))
            ));
            code.line(format!("func_name={},", py_str(function_name)));
            code.line(format!("params={{{}: None}},", py_str(&param.name)));
            code.dedent();
            code.line(")");
            code.dedent();
        }
        code
    }

    /// Resolve system parameters: caller value, then context, then IR default.
    pub fn implicit_resolution(&self) -> Code {
        let mut code = Code::new();
        for param in &self.implicit {
            code.open(format!("if {} is None:", param.name));
            code.line(format!(
                "{} = ctx.get_system_value({})",
                param.name,
                py_str(&param.system_name)
            ));
            code.dedent();
            if let Some(default) = &param.default {
                code.open(format!("if {} is None:", param.name));
                code.line(format!("{} = {}", param.name, default));
                code.dedent();
            }
        }
        code
    }

    /// Every annotation used by the signature.
    pub fn annotations(&self) -> Vec<PyType> {
        self.params
            .iter()
            .map(|p| p.py_type.clone())
            .chain(self.implicit.iter().map(|p| p.py_type.clone()))
            .collect()
    }

    /// Python names of declared parameters.
    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }
}
