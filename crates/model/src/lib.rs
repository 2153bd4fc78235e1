//! OpenAI-compatible model client.
//!
//! Works with OpenAI and any endpoint exposing a compatible
//! `/chat/completions` route. Maps the provider's finish reason onto
//! [`FinishReason`] and extracts tool calls in the order the model
//! returned them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tabletalk_core::client::{ChatClient, ChatRequest, Completion, FinishReason};
use tabletalk_core::error::ClientError;
use tabletalk_core::message::{ChatMessage, Role};
use tabletalk_core::tool::{ToolCallRequest, ToolDescriptor};

/// A chat client for OpenAI-compatible endpoints.
pub struct OpenAiClient {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "openai".into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }

    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::Tool => "tool".into(),
                },
                content: Some(m.text.clone()),
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    fn to_api_tools(tools: &[ToolDescriptor]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }
}

/// Map the wire-level finish reason string onto the domain enum.
/// Anything outside `stop`/`tool_calls` is carried verbatim in `Other`.
fn map_finish_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        Some("stop") => FinishReason::Stop,
        Some("tool_calls") => FinishReason::ToolCalls,
        Some(other) => FinishReason::Other(other.to_string()),
        None => FinishReason::Other("missing".to_string()),
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: ChatRequest) -> Result<Completion, ClientError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
            body["parallel_tool_calls"] = serde_json::json!(request.allow_multiple_tool_calls);
        }

        debug!(model = %self.model, messages = request.messages.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 401 || status == 403 {
            return Err(ClientError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ClientError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ClientError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::MalformedResponse("No choices in response".into()))?;

        Ok(completion_from_choice(choice))
    }
}

/// Build a [`Completion`] from one API choice, preserving tool-call
/// order. Unparseable argument payloads degrade to an empty object so
/// the loop's required-argument validation reports them as missing.
fn completion_from_choice(choice: ApiChoice) -> Completion {
    let tool_calls: Vec<ToolCallRequest> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCallRequest {
            id: tc.id,
            name: tc.function.name,
            arguments: serde_json::from_str(&tc.function.arguments)
                .unwrap_or_else(|_| serde_json::json!({})),
        })
        .collect();

    Completion {
        finish_reason: map_finish_reason(choice.finish_reason.as_deref()),
        text: choice.message.content.unwrap_or_default(),
        tool_calls,
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunction,
}

#[derive(Debug, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(map_finish_reason(Some("stop")), FinishReason::Stop);
        assert_eq!(map_finish_reason(Some("tool_calls")), FinishReason::ToolCalls);
        assert_eq!(
            map_finish_reason(Some("length")),
            FinishReason::Other("length".into())
        );
        assert_eq!(
            map_finish_reason(None),
            FinishReason::Other("missing".into())
        );
    }

    #[test]
    fn parses_stop_choice() {
        let raw = r#"{
            "choices": [{
                "message": { "content": "All done." },
                "finish_reason": "stop"
            }]
        }"#;
        let resp: ApiResponse = serde_json::from_str(raw).unwrap();
        let completion = completion_from_choice(resp.choices.into_iter().next().unwrap());
        assert_eq!(completion.finish_reason, FinishReason::Stop);
        assert_eq!(completion.text, "All done.");
        assert!(completion.tool_calls.is_empty());
    }

    #[test]
    fn parses_tool_call_choice_in_order() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        { "id": "call_1", "function": { "name": "list_tables", "arguments": "{}" } },
                        { "id": "call_2", "function": { "name": "read_query", "arguments": "{\"query\":\"SELECT 1\"}" } }
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let resp: ApiResponse = serde_json::from_str(raw).unwrap();
        let completion = completion_from_choice(resp.choices.into_iter().next().unwrap());
        assert_eq!(completion.finish_reason, FinishReason::ToolCalls);
        assert_eq!(completion.text, "");
        assert_eq!(completion.tool_calls.len(), 2);
        assert_eq!(completion.tool_calls[0].name, "list_tables");
        assert_eq!(completion.tool_calls[1].name, "read_query");
        assert_eq!(
            completion.tool_calls[1].arguments["query"],
            serde_json::json!("SELECT 1")
        );
    }

    #[test]
    fn garbled_arguments_become_empty_object() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "tool_calls": [
                        { "id": "c", "function": { "name": "read_query", "arguments": "not json" } }
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let resp: ApiResponse = serde_json::from_str(raw).unwrap();
        let completion = completion_from_choice(resp.choices.into_iter().next().unwrap());
        assert_eq!(completion.tool_calls[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn tool_result_message_carries_call_id() {
        let msgs = vec![ChatMessage::tool_result("call_9", "4 rows")];
        let api = OpenAiClient::to_api_messages(&msgs);
        assert_eq!(api[0].role, "tool");
        assert_eq!(api[0].tool_call_id.as_deref(), Some("call_9"));
    }
}
