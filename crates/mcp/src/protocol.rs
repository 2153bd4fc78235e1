//! JSON-RPC 2.0 message types plus the MCP payloads tabletalk uses:
//! `initialize`, `tools/list`, and `tools/call`. Every message travels
//! as a single newline-delimited line of JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tabletalk_core::ToolDescriptor;

/// Protocol revision sent during the `initialize` handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// A request carrying an `id`; the server must answer it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A fire-and-forget notification; no `id`, no response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params: None,
        }
    }
}

/// A response matched to a request by `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    /// Unwrap the result, surfacing the error object if the server
    /// returned one. A missing `result` field maps to `Null`.
    pub fn into_result(self) -> Result<Value, RpcErrorObject> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// The JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for RpcErrorObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcErrorObject {}

/// Parameters for the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub capabilities: Value,
    pub client_info: ClientInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl InitializeParams {
    pub fn current() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: serde_json::json!({}),
            client_info: ClientInfo {
                name: "tabletalk".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        }
    }
}

/// One tool definition as the server advertises it in `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerToolDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl From<ServerToolDef> for ToolDescriptor {
    fn from(def: ServerToolDef) -> Self {
        ToolDescriptor {
            name: def.name,
            description: def.description,
            parameters: def.input_schema,
        }
    }
}

/// Result payload of `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolListing {
    pub tools: Vec<ServerToolDef>,
}

/// One content item of a `tools/call` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: String,
}

/// Result payload of `tools/call`. `isError` marks a tool-level
/// failure the server reports in-band rather than via JSON-RPC error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResult {
    #[serde(default)]
    pub content: Vec<CallContent>,
    #[serde(default)]
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl CallResult {
    /// Flatten the text content items into a single string.
    pub fn flattened_text(&self) -> String {
        self.content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_missing_params() {
        let req = RpcRequest::new(2, "tools/list", None);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"id\":2"));
        assert!(!json.contains("params"));
    }

    #[test]
    fn notification_carries_no_id() {
        let notif = RpcNotification::new("notifications/initialized");
        let json = serde_json::to_string(&notif).unwrap();
        assert!(json.contains("\"method\":\"notifications/initialized\""));
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn response_into_result_surfaces_error_object() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#;
        let resp: RpcResponse = serde_json::from_str(raw).unwrap();
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, -32601);
        assert_eq!(format!("{err}"), "JSON-RPC error -32601: Method not found");
    }

    #[test]
    fn missing_result_maps_to_null() {
        let raw = r#"{"jsonrpc":"2.0","id":7}"#;
        let resp: RpcResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn tool_def_converts_to_descriptor() {
        let raw = r#"{
            "name": "read_query",
            "description": "Execute a SELECT query",
            "inputSchema": {
                "type": "object",
                "properties": { "query": { "type": "string" } }
            }
        }"#;
        let def: ServerToolDef = serde_json::from_str(raw).unwrap();
        let desc: ToolDescriptor = def.into();
        assert_eq!(desc.name, "read_query");
        assert!(desc.parameters["properties"]["query"].is_object());
    }

    #[test]
    fn tool_def_defaults_schema_and_description() {
        let raw = r#"{ "name": "list_tables" }"#;
        let def: ServerToolDef = serde_json::from_str(raw).unwrap();
        assert_eq!(def.description, "");
        assert_eq!(def.input_schema["type"], "object");
    }

    #[test]
    fn call_result_flattens_text_content_only() {
        let raw = r#"{
            "content": [
                { "type": "text", "text": "col_a|col_b" },
                { "type": "image", "text": "ignored" },
                { "type": "text", "text": "1|2" }
            ]
        }"#;
        let result: CallResult = serde_json::from_str(raw).unwrap();
        assert!(!result.is_error);
        assert_eq!(result.flattened_text(), "col_a|col_b\n1|2");
    }

    #[test]
    fn call_result_reads_is_error_flag() {
        let raw = r#"{
            "content": [{ "type": "text", "text": "no such table: missing" }],
            "isError": true
        }"#;
        let result: CallResult = serde_json::from_str(raw).unwrap();
        assert!(result.is_error);
    }

    #[test]
    fn initialize_params_pin_protocol_version() {
        let params = InitializeParams::current();
        assert_eq!(params.protocol_version, "2024-11-05");
        assert_eq!(params.client_info.name, "tabletalk");
    }
}
