//! Message and Conversation domain types.
//!
//! A [`StoredMessage`] is the durable, append-only record; a
//! [`ChatMessage`] is the lightweight role+text shape the model client
//! consumes. The orchestration loop moves between the two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Whether a stored message was a conversation's final outcome.
///
/// Intermediate assistant turns (the text accompanying a tool-call
/// request) stay `None` and are excluded from replayed context; tool
/// replies and final replies are included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finality {
    None,
    FinalReply,
    ToolReply,
}

impl Finality {
    /// Integer column encoding: 0 = none, 1 = final reply, 2 = tool reply.
    pub fn as_i64(&self) -> i64 {
        match self {
            Finality::None => 0,
            Finality::FinalReply => 1,
            Finality::ToolReply => 2,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => Finality::FinalReply,
            2 => Finality::ToolReply,
            _ => Finality::None,
        }
    }
}

/// A durable chat message as persisted by the message store.
///
/// Immutable once created: the store only appends, never edits. Ids are
/// store-assigned and monotonic, so ascending id order is replay order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Store-assigned monotonic id
    pub id: i64,

    /// Owning conversation; `None` marks a global seed message visible
    /// to every conversation
    pub conversation_id: Option<i64>,

    /// Who produced this message
    pub role: Role,

    /// The text content
    pub text: String,

    /// Set for user prompts and final replies; intermediate turns and
    /// tool replies carry no timestamp
    pub created_at: Option<DateTime<Utc>>,

    /// Finality marker
    pub finality: Finality,
}

/// A message awaiting persistence (no id yet).
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Option<i64>,
    pub role: Role,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub finality: Finality,
}

impl NewMessage {
    /// A user prompt, stamped with the current time.
    pub fn user_prompt(conversation_id: i64, text: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            role: Role::User,
            text: text.into(),
            created_at: Some(Utc::now()),
            finality: Finality::None,
        }
    }

    /// An intermediate assistant turn that requested tool calls.
    pub fn intermediate(conversation_id: i64, text: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            role: Role::Assistant,
            text: text.into(),
            created_at: None,
            finality: Finality::None,
        }
    }

    /// A tool reply, included in replayed context.
    pub fn tool_reply(conversation_id: i64, role: Role, text: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            role,
            text: text.into(),
            created_at: None,
            finality: Finality::ToolReply,
        }
    }

    /// The final assistant reply, stamped with the current time.
    pub fn final_reply(conversation_id: i64, text: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            role: Role::Assistant,
            text: text.into(),
            created_at: Some(Utc::now()),
            finality: Finality::FinalReply,
        }
    }
}

/// A conversation row. Messages cascade-delete with their conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub owner_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// The model-facing message shape: role + text, plus the tool-call id
/// a tool result answers (ephemeral, never persisted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            text: text.into(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

impl From<&StoredMessage> for ChatMessage {
    fn from(m: &StoredMessage) -> Self {
        ChatMessage::new(m.role, m.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finality_roundtrips_through_column_encoding() {
        for f in [Finality::None, Finality::FinalReply, Finality::ToolReply] {
            assert_eq!(Finality::from_i64(f.as_i64()), f);
        }
    }

    #[test]
    fn unknown_finality_value_decodes_as_none() {
        assert_eq!(Finality::from_i64(7), Finality::None);
    }

    #[test]
    fn role_parses_from_column_text() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!("tool".parse::<Role>().unwrap(), Role::Tool);
        assert!("system".parse::<Role>().is_err());
    }

    #[test]
    fn user_prompt_carries_a_timestamp() {
        let msg = NewMessage::user_prompt(1, "hello");
        assert_eq!(msg.role, Role::User);
        assert!(msg.created_at.is_some());
        assert_eq!(msg.finality, Finality::None);
    }

    #[test]
    fn intermediate_turn_has_no_timestamp() {
        let msg = NewMessage::intermediate(1, "let me check");
        assert!(msg.created_at.is_none());
        assert_eq!(msg.finality, Finality::None);
    }

    #[test]
    fn stored_message_maps_to_chat_message() {
        let stored = StoredMessage {
            id: 3,
            conversation_id: Some(1),
            role: Role::Assistant,
            text: "done".into(),
            created_at: None,
            finality: Finality::FinalReply,
        };
        let chat = ChatMessage::from(&stored);
        assert_eq!(chat.role, Role::Assistant);
        assert_eq!(chat.text, "done");
        assert!(chat.tool_call_id.is_none());
    }
}
