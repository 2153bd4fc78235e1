//! [`ToolGateway`] implementation backed by one MCP server connection.
//!
//! Connecting performs the three-step handshake: `initialize`,
//! `notifications/initialized`, then an initial `tools/list` to verify
//! the server actually serves tools. After that the gateway lives for
//! the whole process and is shared by reference across requests.

use async_trait::async_trait;
use serde_json::Value;

use tabletalk_config::ToolServerConfig;
use tabletalk_core::{GatewayError, ToolDescriptor, ToolGateway, ToolOutcome};

use crate::protocol::{CallResult, InitializeParams, ToolListing};
use crate::transport::{RpcTransport, StdioTransport, TransportError};

pub struct McpGateway {
    transport: Box<dyn RpcTransport>,
}

impl std::fmt::Debug for McpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpGateway").finish_non_exhaustive()
    }
}

impl From<TransportError> for GatewayError {
    fn from(e: TransportError) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

impl McpGateway {
    /// Spawn the configured server and run the MCP handshake.
    pub async fn connect(config: &ToolServerConfig) -> Result<Self, GatewayError> {
        tracing::info!(command = %config.command, "spawning tool server");
        let transport = StdioTransport::spawn(config)?;
        let gateway = Self::handshake(Box::new(transport)).await?;
        Ok(gateway)
    }

    /// Handshake over an already-open transport. Split out so tests
    /// can drive it with a fake transport.
    pub(crate) async fn handshake(
        transport: Box<dyn RpcTransport>,
    ) -> Result<Self, GatewayError> {
        let params = serde_json::to_value(InitializeParams::current())
            .map_err(|e| GatewayError::Protocol(format!("serialize initialize params: {e}")))?;

        let resp = transport.send_request("initialize", Some(params)).await?;
        resp.into_result()
            .map_err(|e| GatewayError::Protocol(format!("initialize failed: {e}")))?;

        transport
            .send_notification("notifications/initialized")
            .await?;

        let gateway = Self { transport };

        let tools = gateway.list_tools().await?;
        tracing::info!(tool_count = tools.len(), "tool server ready");

        Ok(gateway)
    }

    /// Whether the server process is still running.
    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    /// Close the connection and reap the child process.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down tool server");
        self.transport.shutdown().await;
    }
}

#[async_trait]
impl ToolGateway for McpGateway {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, GatewayError> {
        let resp = self.transport.send_request("tools/list", None).await?;
        let value = resp
            .into_result()
            .map_err(|e| GatewayError::Protocol(format!("tools/list failed: {e}")))?;

        let listing: ToolListing = serde_json::from_value(value)
            .map_err(|e| GatewayError::Protocol(format!("parse tools/list result: {e}")))?;

        Ok(listing.tools.into_iter().map(Into::into).collect())
    }

    async fn invoke(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolOutcome, GatewayError> {
        if !self.transport.is_alive() {
            return Err(GatewayError::Transport(
                "tool server process has exited".into(),
            ));
        }

        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        let resp = self.transport.send_request("tools/call", Some(params)).await?;
        let value = resp.into_result().map_err(|e| {
            // -32602 is the JSON-RPC invalid-params code.
            if e.code == -32602 {
                GatewayError::InvalidArguments(e.message.clone())
            } else {
                GatewayError::ExecutionFailed {
                    tool_name: name.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let result: CallResult = serde_json::from_value(value.clone())
            .map_err(|e| GatewayError::Protocol(format!("parse tools/call result: {e}")))?;

        if result.is_error {
            tracing::warn!(tool = name, "tool server reported in-band failure");
        }

        Ok(ToolOutcome {
            success: !result.is_error,
            text: result.flattened_text(),
            raw: value,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::protocol::{RpcErrorObject, RpcResponse};

    /// Scripted transport: pops one canned response per request and
    /// records everything sent. State lives behind an `Arc` so tests
    /// can keep a handle after boxing the transport.
    #[derive(Clone)]
    struct ScriptedTransport {
        state: Arc<ScriptState>,
    }

    struct ScriptState {
        responses: Mutex<Vec<RpcResponse>>,
        sent: Mutex<Vec<(String, Option<Value>)>>,
        notifications: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(mut responses: Vec<RpcResponse>) -> Self {
            responses.reverse();
            Self {
                state: Arc::new(ScriptState {
                    responses: Mutex::new(responses),
                    sent: Mutex::new(Vec::new()),
                    notifications: Mutex::new(Vec::new()),
                }),
            }
        }

        fn sent_methods(&self) -> Vec<String> {
            self.state
                .sent
                .lock()
                .unwrap()
                .iter()
                .map(|(m, _)| m.clone())
                .collect()
        }

        fn notifications(&self) -> Vec<String> {
            self.state.notifications.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RpcTransport for ScriptedTransport {
        async fn send_request(
            &self,
            method: &str,
            params: Option<Value>,
        ) -> Result<RpcResponse, TransportError> {
            self.state
                .sent
                .lock()
                .unwrap()
                .push((method.to_string(), params));
            self.state
                .responses
                .lock()
                .unwrap()
                .pop()
                .ok_or(TransportError::ProcessExited)
        }

        async fn send_notification(&self, method: &str) -> Result<(), TransportError> {
            self.state
                .notifications
                .lock()
                .unwrap()
                .push(method.to_string());
            Ok(())
        }

        fn is_alive(&self) -> bool {
            true
        }

        async fn shutdown(&self) {}
    }

    fn ok_response(id: u64, result: Value) -> RpcResponse {
        RpcResponse {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error_response(id: u64, code: i64, message: &str) -> RpcResponse {
        RpcResponse {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(RpcErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    fn empty_listing(id: u64) -> RpcResponse {
        ok_response(id, serde_json::json!({ "tools": [] }))
    }

    #[tokio::test]
    async fn handshake_runs_initialize_then_notification_then_list() {
        let transport = ScriptedTransport::new(vec![
            ok_response(1, serde_json::json!({ "capabilities": {} })),
            empty_listing(2),
        ]);
        let handle = transport.clone();

        let gateway = McpGateway::handshake(Box::new(transport)).await.unwrap();
        assert!(gateway.is_alive());
        assert_eq!(handle.sent_methods(), vec!["initialize", "tools/list"]);
        assert_eq!(handle.notifications(), vec!["notifications/initialized"]);
    }

    #[tokio::test]
    async fn handshake_fails_when_initialize_errors() {
        let transport = Box::new(ScriptedTransport::new(vec![error_response(
            1,
            -32600,
            "Invalid request",
        )]));
        let err = McpGateway::handshake(transport).await.unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)));
        assert!(err.to_string().contains("initialize failed"));
    }

    #[tokio::test]
    async fn list_tools_maps_definitions_to_descriptors() {
        let listing = serde_json::json!({
            "tools": [
                {
                    "name": "read_query",
                    "description": "Execute a SELECT query",
                    "inputSchema": {
                        "type": "object",
                        "properties": { "query": { "type": "string" } }
                    }
                },
                { "name": "list_tables" }
            ]
        });
        let transport = Box::new(ScriptedTransport::new(vec![
            ok_response(1, serde_json::json!({})),
            empty_listing(2),
            ok_response(3, listing),
        ]));
        let gateway = McpGateway::handshake(transport).await.unwrap();

        let tools = gateway.list_tools().await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "read_query");
        assert_eq!(tools[1].name, "list_tables");
        assert_eq!(tools[1].description, "");
    }

    #[tokio::test]
    async fn invoke_flattens_text_and_reads_error_flag() {
        let call_result = serde_json::json!({
            "content": [
                { "type": "text", "text": "artists|albums" }
            ]
        });
        let transport = Box::new(ScriptedTransport::new(vec![
            ok_response(1, serde_json::json!({})),
            empty_listing(2),
            ok_response(3, call_result),
        ]));
        let gateway = McpGateway::handshake(transport).await.unwrap();

        let outcome = gateway
            .invoke("list_tables", serde_json::json!({}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.text, "artists|albums");
    }

    #[tokio::test]
    async fn invoke_marks_in_band_failure_unsuccessful() {
        let call_result = serde_json::json!({
            "content": [{ "type": "text", "text": "no such table: missing" }],
            "isError": true
        });
        let transport = Box::new(ScriptedTransport::new(vec![
            ok_response(1, serde_json::json!({})),
            empty_listing(2),
            ok_response(3, call_result),
        ]));
        let gateway = McpGateway::handshake(transport).await.unwrap();

        let outcome = gateway
            .invoke("describe_table", serde_json::json!({ "table_name": "missing" }))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.text, "no such table: missing");
    }

    #[tokio::test]
    async fn invoke_maps_invalid_params_code() {
        let transport = Box::new(ScriptedTransport::new(vec![
            ok_response(1, serde_json::json!({})),
            empty_listing(2),
            error_response(3, -32602, "missing required field: query"),
        ]));
        let gateway = McpGateway::handshake(transport).await.unwrap();

        let err = gateway
            .invoke("read_query", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArguments(_)));
    }
}
