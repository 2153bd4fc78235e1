//! ChatClient trait — the abstraction over the language-model provider.
//!
//! The orchestration loop calls `send()` with the full working context
//! and the tool descriptor set, then branches on the finish reason.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::message::ChatMessage;
use crate::tool::{ToolCallRequest, ToolDescriptor};

/// Why a generation round ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    /// The model produced a final answer
    Stop,
    /// The model requested one or more tool invocations
    ToolCalls,
    /// Anything else the provider reports (length, content filter, ...)
    Other(String),
}

/// A request to the model provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The working context, ascending creation order
    pub messages: Vec<ChatMessage>,

    /// Tools the model may call this round
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDescriptor>,

    /// Sampling temperature (the loop pins this to 0)
    pub temperature: f32,

    /// Whether the model may return several tool calls in one round
    pub allow_multiple_tool_calls: bool,
}

/// One completed generation round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub finish_reason: FinishReason,

    /// The assistant text, possibly empty when only tool calls came back
    pub text: String,

    /// Tool calls in the order the model returned them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

/// The model-client seam. One implementation talks to an
/// OpenAI-compatible endpoint; tests substitute mocks.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// A human-readable provider name.
    fn name(&self) -> &str;

    /// Send the working context and get one completion back.
    async fn send(&self, request: ChatRequest) -> Result<Completion, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[test]
    fn completion_without_tool_calls_serializes_compactly() {
        let completion = Completion {
            finish_reason: FinishReason::Stop,
            text: "hi".into(),
            tool_calls: vec![],
        };
        let json = serde_json::to_string(&completion).unwrap();
        assert!(!json.contains("tool_calls"));
    }

    #[test]
    fn chat_request_holds_context_order() {
        let req = ChatRequest {
            messages: vec![
                ChatMessage::new(Role::User, "first"),
                ChatMessage::new(Role::Assistant, "second"),
            ],
            tools: vec![],
            temperature: 0.0,
            allow_multiple_tool_calls: true,
        };
        assert_eq!(req.messages[0].text, "first");
        assert_eq!(req.messages[1].text, "second");
    }
}
