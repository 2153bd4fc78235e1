//! Error types for the tabletalk domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each bounded
//! context has its own error enum; [`ChatError`] is what a request
//! handler sees from the orchestration loop.

use thiserror::Error;

/// Errors surfaced by one chat request.
///
/// `Validation` and `UnknownFinishReason` carry the exact client-facing
/// text and map to 400; store/client/gateway failures map to 500.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A structural protocol violation: missing required tool argument
    /// or a tool name outside the recognized set. The message is the
    /// literal client-visible text.
    #[error("{0}")]
    Validation(String),

    #[error("Unknown finish reason.")]
    UnknownFinishReason,

    /// The round ceiling was hit without a final answer.
    #[error("Tool loop exceeded {0} rounds without a final answer.")]
    ToolLoopExceeded(u32),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("model client error: {0}")]
    Client(#[from] ClientError),

    #[error("tool gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl ChatError {
    /// Whether this error is the caller's fault (4xx) rather than ours.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ChatError::Validation(_)
                | ChatError::UnknownFinishReason
                | ChatError::ToolLoopExceeded(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("tool transport error: {0}")]
    Transport(String),

    #[error("tool protocol error: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_displays_literal_text() {
        let err = ChatError::Validation("The query argument is required.".into());
        assert_eq!(err.to_string(), "The query argument is required.");
        assert!(err.is_client_error());
    }

    #[test]
    fn unknown_finish_reason_has_fixed_text() {
        assert_eq!(
            ChatError::UnknownFinishReason.to_string(),
            "Unknown finish reason."
        );
    }

    #[test]
    fn store_failure_is_not_a_client_error() {
        let err = ChatError::Store(StoreError::Storage("disk full".into()));
        assert!(!err.is_client_error());
    }

    #[test]
    fn gateway_execution_error_names_the_tool() {
        let err = GatewayError::ExecutionFailed {
            tool_name: "read_query".into(),
            reason: "syntax error".into(),
        };
        assert!(err.to_string().contains("read_query"));
        assert!(err.to_string().contains("syntax error"));
    }
}
