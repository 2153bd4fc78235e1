//! MCP tool gateway.
//!
//! Spawns the configured tool-server child process, performs the MCP
//! handshake over newline-delimited JSON-RPC on stdin/stdout, and
//! exposes the server's tools through [`tabletalk_core::ToolGateway`].
//!
//! One server, one process, one connection for the lifetime of the
//! application. The transport serializes request/response cycles so
//! concurrent chat requests cannot interleave on the pipe.

pub mod gateway;
pub mod protocol;
pub mod transport;

pub use gateway::McpGateway;
pub use transport::{RpcTransport, StdioTransport, TransportError};
