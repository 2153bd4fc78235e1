//! The recognized tool set and its argument contracts.
//!
//! The model may only call the eight database tools the server exposes.
//! Each contract names the tool, its single required argument (if any),
//! and the exact client-facing error when that argument is missing.
//! Validation happens before any tool in the round executes, so a bad
//! round never reaches the gateway and never persists.

use serde_json::Value;

use tabletalk_core::{ChatError, ToolCallRequest};

/// One entry in the recognized tool set.
#[derive(Debug, Clone, Copy)]
pub struct ToolContract {
    /// The name the model calls.
    pub name: &'static str,
    /// The single required argument, if the tool takes one.
    pub required_arg: Option<&'static str>,
    /// The client-facing text when the required argument is absent.
    pub missing_arg_error: Option<&'static str>,
}

const MISSING_QUERY: &str = "The query argument is required.";
const MISSING_TABLE_NAME: &str = "The table name argument is required.";
const MISSING_INSIGHT: &str = "The insight argument is required.";

/// The closed tool set, in the server's advertised order.
pub const TOOL_CONTRACTS: &[ToolContract] = &[
    ToolContract {
        name: "read_query",
        required_arg: Some("query"),
        missing_arg_error: Some(MISSING_QUERY),
    },
    ToolContract {
        name: "write_query",
        required_arg: Some("query"),
        missing_arg_error: Some(MISSING_QUERY),
    },
    ToolContract {
        name: "create_table",
        required_arg: Some("query"),
        missing_arg_error: Some(MISSING_QUERY),
    },
    ToolContract {
        name: "alter_table",
        required_arg: Some("query"),
        missing_arg_error: Some(MISSING_QUERY),
    },
    ToolContract {
        name: "describe_table",
        required_arg: Some("table_name"),
        missing_arg_error: Some(MISSING_TABLE_NAME),
    },
    ToolContract {
        name: "append_insight",
        required_arg: Some("insight"),
        missing_arg_error: Some(MISSING_INSIGHT),
    },
    ToolContract {
        name: "list_tables",
        required_arg: None,
        missing_arg_error: None,
    },
    ToolContract {
        name: "list_insights",
        required_arg: None,
        missing_arg_error: None,
    },
];

/// Look up a contract by tool name.
pub fn contract_for(name: &str) -> Option<&'static ToolContract> {
    TOOL_CONTRACTS.iter().find(|c| c.name == name)
}

/// Validate one tool call against the recognized set.
///
/// An unrecognized name or a missing required argument is a structural
/// protocol violation carrying the literal client-visible text.
pub fn validate(call: &ToolCallRequest) -> Result<&'static ToolContract, ChatError> {
    let contract = contract_for(&call.name)
        .ok_or_else(|| ChatError::Validation(format!("Unknown tool call: {}", call.name)))?;

    if let Some(field) = contract.required_arg {
        if call.arguments.get(field).is_none() {
            let text = contract
                .missing_arg_error
                .unwrap_or(MISSING_QUERY)
                .to_string();
            return Err(ChatError::Validation(text));
        }
    }

    Ok(contract)
}

impl ToolContract {
    /// Build the arguments forwarded to the gateway: only the contract's
    /// required argument passes through; no-argument tools get `{}`.
    pub fn forwarded_args(&self, model_args: &Value) -> Value {
        match self.required_arg {
            Some(field) => {
                let value = model_args.get(field).cloned().unwrap_or(Value::Null);
                serde_json::json!({ field: value })
            }
            None => serde_json::json!({}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn recognizes_all_eight_tools() {
        for name in [
            "read_query",
            "write_query",
            "create_table",
            "alter_table",
            "describe_table",
            "append_insight",
            "list_tables",
            "list_insights",
        ] {
            assert!(contract_for(name).is_some(), "missing contract for {name}");
        }
    }

    #[test]
    fn unknown_tool_yields_literal_text() {
        let err = validate(&call("drop_database", serde_json::json!({}))).unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool call: drop_database");
    }

    #[test]
    fn missing_query_yields_literal_text() {
        let err = validate(&call("read_query", serde_json::json!({}))).unwrap_err();
        assert_eq!(err.to_string(), "The query argument is required.");
    }

    #[test]
    fn missing_table_name_yields_literal_text() {
        let err = validate(&call("describe_table", serde_json::json!({ "other": 1 }))).unwrap_err();
        assert_eq!(err.to_string(), "The table name argument is required.");
    }

    #[test]
    fn missing_insight_yields_literal_text() {
        let err = validate(&call("append_insight", serde_json::json!({}))).unwrap_err();
        assert_eq!(err.to_string(), "The insight argument is required.");
    }

    #[test]
    fn append_insight_targets_its_own_operation() {
        let contract = validate(&call(
            "append_insight",
            serde_json::json!({ "insight": "sales dip on Mondays" }),
        ))
        .unwrap();
        assert_eq!(contract.name, "append_insight");
    }

    #[test]
    fn no_argument_tools_validate_with_empty_args() {
        assert!(validate(&call("list_tables", serde_json::json!({}))).is_ok());
        assert!(validate(&call("list_insights", serde_json::json!({}))).is_ok());
    }

    #[test]
    fn forwarded_args_pass_only_the_required_field() {
        let contract = contract_for("read_query").unwrap();
        let forwarded = contract.forwarded_args(&serde_json::json!({
            "query": "SELECT 1",
            "extra": "dropped"
        }));
        assert_eq!(forwarded, serde_json::json!({ "query": "SELECT 1" }));
    }

    #[test]
    fn forwarded_args_empty_for_no_argument_tools() {
        let contract = contract_for("list_tables").unwrap();
        assert_eq!(
            contract.forwarded_args(&serde_json::json!({ "noise": true })),
            serde_json::json!({})
        );
    }
}
