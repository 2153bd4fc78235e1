//! Core domain types and traits for tabletalk.
//!
//! Everything the other crates agree on lives here: message and
//! conversation types, the model-client and tool-gateway seams, the
//! message-store contract, and the error taxonomy.

pub mod client;
pub mod error;
pub mod message;
pub mod store;
pub mod tool;

pub use client::{ChatClient, ChatRequest, Completion, FinishReason};
pub use error::{ChatError, ClientError, GatewayError, StoreError};
pub use message::{ChatMessage, Conversation, Finality, NewMessage, Role, StoredMessage};
pub use store::MessageStore;
pub use tool::{ToolCallRequest, ToolDescriptor, ToolGateway, ToolOutcome};
