//! Tool gateway seam — discovery and invocation of external tools.
//!
//! The gateway owns a long-lived connection to the external tool
//! process; it is created once at startup and shared by reference
//! across concurrent request handlers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// A tool the external process advertises, sent on to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// JSON Schema for the tool's parameters
    pub parameters: serde_json::Value,
}

/// A structured request from the model to invoke a named tool.
/// Ephemeral: produced per round, never persisted directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned call id
    pub id: String,

    pub name: String,

    /// Arguments payload as the model supplied it
    pub arguments: serde_json::Value,
}

/// The outcome of one tool invocation, mapped into a message before
/// persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,

    /// Flattened text content
    pub text: String,

    /// The raw result payload from the tool process
    pub raw: serde_json::Value,
}

/// The tool-gateway seam.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// List the tools currently available. The loop queries this once
    /// per request and holds the set for the request's duration.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, GatewayError>;

    /// Invoke a tool by name with already-validated arguments.
    async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutcome, GatewayError>;
}
