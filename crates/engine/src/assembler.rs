//! Conversation assembly: turn the stored replay context into the
//! model-facing message list.
//!
//! The store hands back visible messages in descending id order (the
//! newest-first shape its index serves cheaply); the model wants them
//! oldest first. Intermediate assistant turns were already filtered out
//! by the store's visibility rule.

use tabletalk_core::{ChatMessage, StoredMessage};

/// Re-order a descending replay into the ascending working context.
pub fn assemble(mut replay: Vec<StoredMessage>) -> Vec<ChatMessage> {
    replay.reverse();
    replay.iter().map(ChatMessage::from).collect()
}
