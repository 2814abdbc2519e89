//! Errors a client session can raise, distinct from a per-call [`McpError`]
//! reply: these abort the session or the dial rather than answer one call.

use thiserror::Error;

use protomcp_transport::TransportError;
use protomcp_types::McpError;

/// A specialized `Result` for client session operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ClientError {
    /// The server replied to `initialize` with a protocol version other
    /// than the one this client requested.
    #[error("protocol version mismatch: requested {requested}, got {actual}")]
    ProtocolVersionMismatch { requested: String, actual: String },

    /// The `initialize` result was missing a required field or failed to parse.
    #[error("malformed initialize result: {0}")]
    MalformedHandshake(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Mcp(#[from] McpError),
}

impl From<ClientError> for McpError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Mcp(e) => e,
            other => McpError::new(protomcp_types::ErrorCode::McpInternal, other.to_string()),
        }
    }
}
