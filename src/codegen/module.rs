//! Module assembly: one IR in, one Python module out.

use super::code::{Code, DEFAULT_INDENT};
use super::execution::{self, ExecRequest};
use super::expr::{ExprRenderer, Scope};
use super::guard::{self, MutationKind};
use super::hierarchy::{self, Hierarchy};
use super::naming::python_identifier;
use super::params::{build_signature, Signature};
use super::schema::{self, SchemaSet};
use super::sql::{self, SqlBuild};
use super::types::import_names;
use super::Dialect;
use crate::config::GeneratorConfig;
use crate::error::GenResult;
use crate::ir::{Affinity, QueryIr};
use std::collections::BTreeSet;
use tracing::debug;

/// Every fragment produced for one function, before assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    /// Python function name.
    pub function_name: String,
    pub dialect: Dialect,
    pub affinity: Affinity,
    pub schemas: Option<SchemaSet>,
    pub hierarchy: Option<Hierarchy>,
    pub signature: Signature,
    pub sql: SqlBuild,
    pub guard: Option<Code>,
    pub execution: Code,
    /// Return annotation of the generated function.
    pub return_type: String,
}

impl GenerationOutput {
    pub fn guard_count(&self) -> usize {
        self.guard
            .as_ref()
            .map(|g| g.lines().iter().filter(|l| l.text == "raise UnsafeQueryError(").count())
            .unwrap_or(0)
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.as_ref().map(|s| s.records.len()).unwrap_or(0)
    }
}

/// A rendered-ready Python module.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedModule {
    pub file_name: String,
    pub code: Code,
    pub output: GenerationOutput,
    indent: usize,
}

impl GeneratedModule {
    /// Python source text.
    pub fn render(&self) -> String {
        self.code.render(self.indent)
    }
}

/// Code generator for one IR snapshot.
pub struct Generator<'a> {
    ir: &'a QueryIr,
    config: &'a GeneratorConfig,
}

impl<'a> Generator<'a> {
    pub fn new(ir: &'a QueryIr, config: &'a GeneratorConfig) -> Self {
        Self { ir, config }
    }

    /// Run every phase and return the fragments.
    pub fn generate_output(&self) -> GenResult<GenerationOutput> {
        let dialect = self.config.validate()?;
        let driver = dialect.driver();
        let ir = self.ir;
        let function_name = python_identifier(&ir.function_name);
        debug!(function = %function_name, dialect = %dialect, "generating");

        let signature = build_signature(ir, driver.as_ref())?;

        let hierarchy = if hierarchy::is_hierarchical(&ir.responses) {
            Some(hierarchy::detect(&ir.responses)?)
        } else {
            None
        };
        let schemas = match &hierarchy {
            Some(h) => schema::build_hierarchical(&ir.function_name, h),
            None if ir.responses.is_empty() => None,
            None => Some(schema::build_flat(&ir.function_name, &ir.responses)?),
        };
        debug!(
            function = %function_name,
            schemas = schemas.as_ref().map(|s| s.records.len()).unwrap_or(0),
            hierarchical = hierarchy.is_some(),
            "response schemas built"
        );

        let renderer = ExprRenderer::new(&ir.expressions);
        let scope = Scope::new();
        let sql = sql::lower(&ir.instructions, &renderer, &scope, dialect)?;

        let guard = guard::synthesize(
            &ir.function_name,
            MutationKind::from_statement(&ir.statement_type),
            ir.where_meta.as_ref(),
            &renderer,
            &scope,
        )?;

        let param_names = signature.param_names();
        let request = ExecRequest::new(&ir.function_name, ir.response_affinity, dialect)
            .with_schemas(schemas.as_ref())
            .with_hierarchy(hierarchy.as_ref())
            .with_params(&param_names);
        let execution = execution::synthesize(&request)?;
        let return_type = execution::return_annotation(ir.response_affinity, schemas.as_ref());

        Ok(GenerationOutput {
            function_name,
            dialect,
            affinity: ir.response_affinity,
            schemas,
            hierarchy,
            signature,
            sql,
            guard,
            execution,
            return_type,
        })
    }

    /// Generate the complete module.
    pub fn generate(&self) -> GenResult<GeneratedModule> {
        let output = self.generate_output()?;
        let code = self.assemble(&output);
        debug!(
            function = %output.function_name,
            lines = code.len(),
            static_sql = output.sql.is_static(),
            guards = output.guard_count(),
            "module assembled"
        );
        Ok(GeneratedModule {
            file_name: format!("{}.py", output.function_name),
            code,
            output,
            indent: if self.config.indent == 0 {
                DEFAULT_INDENT
            } else {
                self.config.indent
            },
        })
    }

    fn assemble(&self, output: &GenerationOutput) -> Code {
        let mut code = Code::new();
        self.header(&mut code);
        self.imports(&mut code, output);

        if let Some(schemas) = &output.schemas {
            for record in &schemas.records {
                code.blank().blank();
                code.extend_nested(record.to_code());
            }
        }

        code.blank().blank();
        code.extend_nested(
            output
                .signature
                .render_def(&output.function_name, &output.return_type),
        );
        code.indent();
        code.extend_nested(self.docstring(&output.signature));

        let needs_ctx = output.guard.is_some() || !output.signature.implicit.is_empty();
        if needs_ctx {
            code.line("ctx = get_snapsql_context()");
        }

        let sections = [
            output.signature.validations(&self.ir.function_name),
            output.signature.implicit_resolution(),
            output.sql.to_code(),
            output.guard.clone().unwrap_or_default(),
            output.execution.clone(),
        ];
        for section in sections.into_iter().filter(|s| !s.is_empty()) {
            code.blank();
            code.extend_nested(section);
        }
        code.dedent();
        code
    }

    fn header(&self, code: &mut Code) {
        code.comment("Code generated by sqlpy. DO NOT EDIT.");
        code.comment(format!("Function: {}", self.ir.function_name));
        if self.config.emit_timestamp {
            code.comment(format!(
                "Generated at: {}",
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
            ));
        }
        code.blank();
        code.line("from __future__ import annotations");
    }

    fn imports(&self, code: &mut Code, output: &GenerationOutput) {
        let driver = output.dialect.driver();

        let mut annotations = output.signature.annotations();
        if let Some(schemas) = &output.schemas {
            annotations.extend(schemas.annotations());
        }
        let (mut typing, stdlib) = import_names(&annotations);
        if output.affinity == Affinity::Many && output.schemas.is_some() {
            typing.insert("AsyncGenerator");
        }
        if driver.connection_annotation() == "Any" {
            typing.insert("Any");
        }
        let type_checking = driver.type_checking_imports();
        if !type_checking.is_empty() {
            typing.insert("TYPE_CHECKING");
        }

        code.blank();
        if let Some(schemas) = &output.schemas {
            if schemas.uses_child_lists() {
                code.line("from dataclasses import dataclass, field");
            } else {
                code.line("from dataclasses import dataclass");
            }
        }
        for line in &stdlib {
            code.line(*line);
        }
        if !typing.is_empty() {
            let names: Vec<&str> = typing.into_iter().collect();
            code.line(format!("from typing import {}", names.join(", ")));
        }

        let runtime = runtime_imports(output);
        if !runtime.is_empty() {
            code.blank();
            code.open(format!("from {} import (", self.config.runtime_module));
            for name in runtime {
                code.line(format!("{},", name));
            }
            code.dedent();
            code.line(")");
        }

        if !type_checking.is_empty() {
            code.blank();
            code.open("if TYPE_CHECKING:");
            for line in type_checking {
                code.line(*line);
            }
            code.dedent();
        }
    }

    fn docstring(&self, signature: &Signature) -> Code {
        let mut code = Code::new();
        let summary = if self.ir.description.trim().is_empty() {
            format!("Execute the {} query.", self.ir.function_name)
        } else {
            self.ir.description.trim().to_string()
        };

        let documented: Vec<_> = signature
            .params
            .iter()
            .filter(|p| !p.description.trim().is_empty())
            .collect();
        if documented.is_empty() && !summary.contains('\n') {
            code.line(format!("\"\"\"{}\"\"\"", docstring_escape(&summary)));
            return code;
        }

        code.line(format!("\"\"\"{}", docstring_escape(summary.lines().next().unwrap_or_default())));
        for line in summary.lines().skip(1) {
            code.line(docstring_escape(line));
        }
        if !documented.is_empty() {
            code.blank();
            code.line("Args:");
            code.indent();
            for param in documented {
                code.line(format!("{}: {}", param.name, docstring_escape(param.description.trim())));
            }
            code.dedent();
        }
        code.line("\"\"\"");
        code
    }
}

/// Names imported from the runtime module, sorted.
fn runtime_imports(output: &GenerationOutput) -> BTreeSet<&'static str> {
    let mut names = BTreeSet::new();
    if output.guard.is_some() || !output.signature.implicit.is_empty() {
        names.insert("get_snapsql_context");
    }
    if output.guard.is_some() {
        names.insert("UnsafeQueryError");
    }
    if output.signature.params.iter().any(|p| !p.optional) {
        names.insert("ValidationError");
    }
    if output.execution.contains("raise NotFoundError(") {
        names.insert("NotFoundError");
    }
    names
}

fn docstring_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
