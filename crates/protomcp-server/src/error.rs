//! Errors a server-side session can raise, distinct from a per-request
//! [`McpError`] reply: these abort the session rather than answer one call.

use thiserror::Error;

use protomcp_transport::TransportError;
use protomcp_types::McpError;

/// A specialized `Result` for server session operations.
pub type ServerResult<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ServerError {
    /// The peer's first inbound message was not `initialize`.
    #[error("handshake failed: first request must be initialize, got {0:?}")]
    NotInitializeFirst(String),

    /// The peer asked for a protocol version this session will not negotiate
    /// away from its own.
    #[error("protocol version mismatch: expected {expected}, got {actual}")]
    ProtocolVersionMismatch { expected: String, actual: String },

    /// `initialize` params were missing a required field or failed to parse.
    #[error("malformed initialize params: {0}")]
    MalformedHandshake(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Mcp(#[from] McpError),
}
