//! UPDATE/DELETE generation and mutation guards.

use super::{output, render};
use crate::codegen::Dialect;
use crate::ir::{
    DynamicCondition, Expression, ImplicitParameter, Instruction, Parameter, QueryIr,
    RemovalLiteral, WhereMeta, WhereStatus,
};
use pretty_assertions::assert_eq;

fn emit(value: &str) -> Instruction {
    Instruction::EmitStatic {
        value: value.to_string(),
    }
}

fn param(name: &str, type_name: &str, optional: bool) -> Parameter {
    Parameter {
        name: name.to_string(),
        type_name: type_name.to_string(),
        optional,
        description: String::new(),
    }
}

fn delete_users() -> QueryIr {
    QueryIr::new("delete_users")
        .with_statement_type("delete")
        .with_parameters(vec![param("ids", "int[]", false)])
        .with_instructions(vec![
            emit("DELETE FROM users"),
            Instruction::If { expr_index: 0 },
            emit(" WHERE id IN ("),
            Instruction::LoopStart {
                variable: "id".into(),
                collection_expr_index: 0,
            },
            Instruction::EmitEval { expr_index: 1 },
            Instruction::EmitUnlessBoundary { value: ", ".into() },
            Instruction::LoopEnd,
            emit(")"),
            Instruction::End,
        ])
        .with_expressions(vec![Expression::ident("ids"), Expression::ident("id")])
        .with_where_meta(WhereMeta {
            status: WhereStatus::Conditional,
            dynamic_conditions: vec![DynamicCondition {
                expr_index: 0,
                negated_when_empty: true,
                has_else: false,
                description: String::new(),
            }],
            removal_combos: vec![vec![RemovalLiteral {
                expr_index: 0,
                when: false,
            }]],
        })
}

#[test]
fn test_dynamic_delete_with_guard() {
    let source = render(&delete_users(), Dialect::Postgres);

    assert!(source.contains(
        "from snapsql_runtime import (\n    UnsafeQueryError,\n    ValidationError,\n    get_snapsql_context,\n)\n"
    ));
    assert!(source.contains("    ids: List[int],\n) -> int:\n"));
    assert!(source.contains("    \"\"\"Execute the delete_users query.\"\"\"\n    ctx = get_snapsql_context()\n"));

    let expected = "    # Build SQL dynamically
    sql_parts = []
    args = []
    sql_parts.append('DELETE FROM users')
    if ids:
        sql_parts.append(' WHERE id IN (')
        _loop_src_1 = ids
        _loop_items_1 = [] if _loop_src_1 is None else list(_loop_src_1) if isinstance(_loop_src_1, (list, tuple, set, frozenset)) else [_loop_src_1]
        for id_1_idx, id_1 in enumerate(_loop_items_1):
            id_1_is_last = id_1_idx == len(_loop_items_1) - 1
            args.append(id_1)
            sql_parts.append(f'${len(args)}')
            if not id_1_is_last:
                sql_parts.append(', ')
        sql_parts.append(')')

    sql = ''.join(sql_parts)

    # Refuse DELETE without an effective WHERE clause
    if not ctx.allow_unsafe_mutations:
        if not (ids):
            raise UnsafeQueryError(
                message='DELETE without an effective WHERE clause is not allowed',
                func_name='delete_users',
                query=sql,
                hint='WHERE clause is removed when not (ids)',
                mutation_kind='delete',
            )

    # Execute query (no result expected)
    status = await conn.execute(sql, *args)
";
    assert!(source.contains(expected), "unexpected module:\n{source}");
}

#[test]
fn test_guard_runs_after_sql_and_before_execution() {
    let source = render(&delete_users(), Dialect::Sqlite);
    let sql = source.find("sql = ''.join(sql_parts)").unwrap();
    let guard = source.find("if not ctx.allow_unsafe_mutations:").unwrap();
    let execute = source.find("await cursor.execute(sql, args)").unwrap();
    assert!(sql < guard && guard < execute);
    assert!(source.contains("            sql_parts.append('?')\n"));
}

#[test]
fn test_fullscan_update_raises_unconditionally() {
    let ir = QueryIr::new("deactivate_all")
        .with_statement_type("UPDATE")
        .with_instructions(vec![emit("UPDATE users SET active = 0")])
        .with_where_meta(WhereMeta::fullscan());

    let out = output(&ir, Dialect::MySql);
    assert_eq!(out.guard_count(), 1);
    let guard = out.guard.unwrap().render(4);
    assert!(guard.contains("if not ctx.allow_unsafe_mutations:\n    raise UnsafeQueryError(\n"));
    assert!(guard.contains("        hint='statement has no WHERE clause',\n"));
    assert!(guard.contains("        mutation_kind='update',\n"));
}

#[test]
fn test_select_is_never_guarded() {
    let ir = QueryIr::new("count_all")
        .with_instructions(vec![emit("SELECT count(*) FROM users")])
        .with_where_meta(WhereMeta::fullscan());
    let out = output(&ir, Dialect::Sqlite);
    assert!(out.guard.is_none());
    assert!(!render(&ir, Dialect::Sqlite).contains("get_snapsql_context"));
}

#[test]
fn test_update_binds_system_value() {
    let ir = QueryIr::new("update_email")
        .with_statement_type("update")
        .with_parameters(vec![param("user_id", "int", false), param("email", "string", false)])
        .with_instructions(vec![
            emit("UPDATE users SET email = ?"),
            Instruction::AddParam { expr_index: 1 },
            emit(", updated_at = ?"),
            Instruction::AddSystemParam {
                system_field: "updated_at".into(),
            },
            emit(" WHERE id = "),
            Instruction::EmitEval { expr_index: 0 },
        ])
        .with_expressions(vec![Expression::ident("user_id"), Expression::ident("email")])
        .with_where_meta(WhereMeta {
            status: WhereStatus::Exists,
            dynamic_conditions: Vec::new(),
            removal_combos: Vec::new(),
        });
    let ir = QueryIr {
        implicit_parameters: vec![ImplicitParameter {
            name: "updated_at".into(),
            type_name: "timestamp".into(),
            default: Some(serde_json::json!("datetime.now()")),
        }],
        ..ir
    };

    let source = render(&ir, Dialect::Postgres);
    assert!(source.contains("from datetime import datetime\n"));
    assert!(source.contains(
        "    user_id: int,\n    email: str,\n    *,\n    updated_at: Optional[datetime] = None,\n) -> int:\n"
    ));
    assert!(source.contains(
        "    if updated_at is None:\n        updated_at = ctx.get_system_value('updated_at')\n    if updated_at is None:\n        updated_at = datetime.now()\n"
    ));
    assert!(source.contains(
        "    sql = 'UPDATE users SET email = $1, updated_at = $2 WHERE id = $3'\n    args = [email, updated_at, user_id]\n"
    ));
    assert!(!source.contains("UnsafeQueryError"));
}

#[test]
fn test_undeclared_system_field_becomes_keyword_argument() {
    let ir = QueryIr::new("stamp_user")
        .with_statement_type("update")
        .with_parameters(vec![param("user_id", "int", false)])
        .with_instructions(vec![
            emit("UPDATE users SET updated_by = "),
            Instruction::AddSystemParam {
                system_field: "updatedBy".into(),
            },
            emit(" WHERE id = "),
            Instruction::EmitEval { expr_index: 0 },
        ])
        .with_expressions(vec![Expression::ident("user_id")]);

    let out = output(&ir, Dialect::Sqlite);
    assert_eq!(
        out.sql.to_code().render(4),
        "sql = 'UPDATE users SET updated_by = ? WHERE id = ?'\nargs = [updated_by, user_id]\n"
    );
    let implicit = &out.signature.implicit;
    assert_eq!(implicit.len(), 1);
    assert_eq!(implicit[0].name, "updated_by");
    assert_eq!(implicit[0].py_type.to_string(), "Optional[Any]");
}

#[test]
fn test_conditional_set_list_mysql() {
    let ir = QueryIr::new("patch_user")
        .with_statement_type("update")
        .with_parameters(vec![
            param("user_id", "int", false),
            param("name", "string", true),
            param("note", "string", true),
        ])
        .with_instructions(vec![
            emit("UPDATE users SET "),
            Instruction::Boundary,
            Instruction::If { expr_index: 1 },
            emit("name = "),
            Instruction::EmitEval { expr_index: 1 },
            Instruction::End,
            Instruction::EmitUnlessBoundary { value: ", ".into() },
            Instruction::If { expr_index: 2 },
            emit("note = CONCAT('100%', "),
            Instruction::EmitEval { expr_index: 2 },
            emit(")"),
            Instruction::End,
            Instruction::Boundary,
            emit(" WHERE id = "),
            Instruction::EmitEval { expr_index: 0 },
        ])
        .with_expressions(vec![
            Expression::ident("user_id"),
            Expression::ident("name"),
            Expression::ident("note"),
        ]);

    let out = output(&ir, Dialect::MySql);
    assert!(!out.sql.is_static());
    let body = out.sql.to_code().render(4);
    assert!(body.contains(
        "sql_parts.append('UPDATE users SET ')\nboundary_needed = False\nif name:\n"
    ));
    assert!(body.contains(
        "if name:\n    sql_parts.append('name = ')\n    boundary_needed = True\n    args.append(name)\n    sql_parts.append('%s')\n    boundary_needed = True\n"
    ));
    assert!(body.contains("if boundary_needed:\n    sql_parts.append(', ')\n"));
    assert!(body.contains("    sql_parts.append('note = CONCAT(\\'100%%\\', ')\n"));
    assert!(body.contains("sql_parts.append(' WHERE id = ')\nboundary_needed = True\nargs.append(user_id)\n"));

    // optional parameters default to None and come after required ones
    let source = render(&ir, Dialect::MySql);
    assert!(source.contains(
        "    user_id: int,\n    name: Optional[str] = None,\n    note: Optional[str] = None,\n"
    ));
}
