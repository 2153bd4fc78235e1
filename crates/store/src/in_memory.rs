//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

use tabletalk_core::error::StoreError;
use tabletalk_core::message::{Conversation, Finality, NewMessage, Role, StoredMessage};
use tabletalk_core::store::MessageStore;

#[derive(Default)]
struct Inner {
    messages: Vec<StoredMessage>,
    conversations: Vec<Conversation>,
    next_message_id: i64,
    next_conversation_id: i64,
}

/// An in-memory message store with the same ordering and visibility
/// semantics as the SQLite backend.
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Total number of stored messages (test helper).
    pub async fn message_count(&self) -> usize {
        self.inner.read().await.messages.len()
    }

    /// All messages in append order (test helper).
    pub async fn all_messages(&self) -> Vec<StoredMessage> {
        self.inner.read().await.messages.clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn store_one(inner: &mut Inner, message: NewMessage) -> StoredMessage {
    inner.next_message_id += 1;
    let stored = StoredMessage {
        id: inner.next_message_id,
        conversation_id: message.conversation_id,
        role: message.role,
        text: message.text,
        created_at: message.created_at,
        finality: message.finality,
    };
    inner.messages.push(stored.clone());
    stored
}

fn visible_in_context(m: &StoredMessage, conversation_id: i64) -> bool {
    match m.conversation_id {
        None => true,
        Some(c) => {
            c == conversation_id
                && (m.role == Role::User
                    || m.finality == Finality::FinalReply
                    || m.finality == Finality::ToolReply)
        }
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn append(&self, message: NewMessage) -> Result<StoredMessage, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(store_one(&mut inner, message))
    }

    async fn append_round(
        &self,
        messages: Vec<NewMessage>,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(messages
            .into_iter()
            .map(|m| store_one(&mut inner, m))
            .collect())
    }

    async fn context(&self, conversation_id: i64) -> Result<Vec<StoredMessage>, StoreError> {
        let inner = self.inner.read().await;
        let mut visible: Vec<StoredMessage> = inner
            .messages
            .iter()
            .filter(|m| visible_in_context(m, conversation_id))
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(visible)
    }

    async fn create_conversation(
        &self,
        owner_id: &str,
        title: &str,
    ) -> Result<Conversation, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_conversation_id += 1;
        let conversation = Conversation {
            id: inner.next_conversation_id,
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            created_at: Utc::now(),
        };
        inner.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn count_conversations(&self, owner_id: &str) -> Result<i64, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .conversations
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .count() as i64)
    }

    async fn list_conversations(&self, owner_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .conversations
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn display_messages(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let inner = self.inner.read().await;
        let mut shown: Vec<StoredMessage> = inner
            .messages
            .iter()
            .filter(|m| {
                m.conversation_id == Some(conversation_id)
                    && (m.role == Role::User
                        || (m.role == Role::Assistant && m.finality == Finality::FinalReply))
            })
            .cloned()
            .collect();
        shown.sort_by_key(|m| m.created_at);
        Ok(shown)
    }
}
