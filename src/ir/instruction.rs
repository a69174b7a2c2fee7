use serde::{Deserialize, Serialize};

/// One optimized instruction from the IR producer.
///
/// The stream is consumed once, left to right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instruction {
    /// Literal SQL text. May embed `?` placeholder markers.
    EmitStatic { value: String },
    /// Placeholder plus the evaluated expression as an argument.
    EmitEval { expr_index: usize },
    /// Argument only; its placeholder came from a preceding static fragment.
    AddParam { expr_index: usize },
    /// Argument taken from a system field (e.g. `updated_at`).
    AddSystemParam { system_field: String },
    If { expr_index: usize },
    #[serde(alias = "ELSEIF")]
    ElseIf { expr_index: usize },
    Else,
    End,
    LoopStart {
        variable: String,
        collection_expr_index: usize,
    },
    LoopEnd,
    /// Delimiter dropped on the last loop iteration or before a boundary.
    EmitUnlessBoundary { value: String },
    Boundary,
}

impl Instruction {
    /// Short opcode name, as it appears on the wire.
    pub fn op_name(&self) -> &'static str {
        match self {
            Instruction::EmitStatic { .. } => "EMIT_STATIC",
            Instruction::EmitEval { .. } => "EMIT_EVAL",
            Instruction::AddParam { .. } => "ADD_PARAM",
            Instruction::AddSystemParam { .. } => "ADD_SYSTEM_PARAM",
            Instruction::If { .. } => "IF",
            Instruction::ElseIf { .. } => "ELSE_IF",
            Instruction::Else => "ELSE",
            Instruction::End => "END",
            Instruction::LoopStart { .. } => "LOOP_START",
            Instruction::LoopEnd => "LOOP_END",
            Instruction::EmitUnlessBoundary { .. } => "EMIT_UNLESS_BOUNDARY",
            Instruction::Boundary => "BOUNDARY",
        }
    }

    /// Whether this instruction opens, continues or closes a block.
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            Instruction::If { .. }
                | Instruction::ElseIf { .. }
                | Instruction::Else
                | Instruction::End
                | Instruction::LoopStart { .. }
                | Instruction::LoopEnd
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_wire_names() {
        let json = r#"[
            {"op": "EMIT_STATIC", "value": "SELECT id FROM users WHERE id = ", "pos": "1:1"},
            {"op": "EMIT_EVAL", "expr_index": 0},
            {"op": "ELSEIF", "expr_index": 1},
            {"op": "ELSE_IF", "expr_index": 2},
            {"op": "LOOP_START", "variable": "item", "collection_expr_index": 3},
            {"op": "EMIT_UNLESS_BOUNDARY", "value": ", "},
            {"op": "LOOP_END"},
            {"op": "ADD_SYSTEM_PARAM", "system_field": "updated_at"},
            {"op": "BOUNDARY"}
        ]"#;
        let parsed: Vec<Instruction> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.len(), 9);
        assert_eq!(parsed[1], Instruction::EmitEval { expr_index: 0 });
        assert_eq!(parsed[2], Instruction::ElseIf { expr_index: 1 });
        assert_eq!(parsed[3], Instruction::ElseIf { expr_index: 2 });
        assert_eq!(parsed[6], Instruction::LoopEnd);
        assert_eq!(parsed[8].op_name(), "BOUNDARY");
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        let err = serde_json::from_str::<Instruction>(r#"{"op": "EMIT_SYSTEM_LIMIT"}"#).unwrap_err();
        assert!(err.to_string().contains("EMIT_SYSTEM_LIMIT"));
    }
}
