//! MessageStore trait — the durable append-only message log.
//!
//! Messages group by conversation; global seed messages have no
//! conversation and are replayed into every context. Backends:
//! SQLite (production) and in-memory (tests), both in `tabletalk-store`.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{Conversation, NewMessage, StoredMessage};

/// Contract for the message store.
///
/// `context` applies the visibility rule: a message is replayed for
/// conversation C iff it is global (no conversation) OR it belongs to C
/// and is a user prompt, a final assistant reply, or a tool reply.
/// Intermediate assistant turns never re-enter the model's context.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append one message, assigning its id. Used for the user prompt,
    /// which commits before the loop starts.
    async fn append(&self, message: NewMessage) -> Result<StoredMessage, StoreError>;

    /// Append all messages of one orchestration round atomically, in
    /// order. Either every message commits or none does.
    async fn append_round(
        &self,
        messages: Vec<NewMessage>,
    ) -> Result<Vec<StoredMessage>, StoreError>;

    /// Replay context for a conversation, visibility rule applied,
    /// ordered descending by id. The assembler re-orders ascending.
    async fn context(&self, conversation_id: i64) -> Result<Vec<StoredMessage>, StoreError>;

    /// Create a conversation with the given title.
    async fn create_conversation(
        &self,
        owner_id: &str,
        title: &str,
    ) -> Result<Conversation, StoreError>;

    /// Number of conversations the owner already has (drives the
    /// auto-incrementing "Chat N" title).
    async fn count_conversations(&self, owner_id: &str) -> Result<i64, StoreError>;

    /// All conversations for an owner, ordered by creation.
    async fn list_conversations(&self, owner_id: &str) -> Result<Vec<Conversation>, StoreError>;

    /// Messages shown in the conversation listing: user prompts and
    /// final assistant replies only, ordered by creation time ascending.
    async fn display_messages(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<StoredMessage>, StoreError>;
}
