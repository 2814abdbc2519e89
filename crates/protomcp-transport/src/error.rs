//! Transport error taxonomy.

use thiserror::Error;

/// A specialized `Result` for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors that can occur during transport operations.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum TransportError {
    /// The transport (or the session owning it) has been closed.
    #[error("transport closed: {0}")]
    Closed(String),

    /// The caller's cancellation token fired before a result was available.
    #[error("operation cancelled")]
    Cancelled,

    /// An underlying I/O failure (connection drop, broken pipe, HTTP
    /// transport failure).
    #[error("io error: {0}")]
    Io(String),

    /// An HTTP response carried a non-success status code.
    #[error("http status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Failed to encode or decode an envelope.
    #[error("codec error: {0}")]
    Codec(String),

    /// A response writer was used after its single reply had already been sent.
    #[error("response already sent for this request")]
    AlreadyReplied,

    /// The peer sent a response whose ID does not match any in-flight request.
    #[error("unmatched response id: {0}")]
    UnmatchedResponseId(String),

    /// A handler-supplied JSON-RPC error, surfaced verbatim.
    #[error("[{code}] {message}")]
    HandlerError {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },
}

impl From<protomcp_protocol::CodecError> for TransportError {
    fn from(e: protomcp_protocol::CodecError) -> Self {
        Self::Codec(e.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

impl From<protomcp_types::JsonRpcError> for TransportError {
    fn from(e: protomcp_types::JsonRpcError) -> Self {
        Self::HandlerError {
            code: e.code,
            message: e.message,
            data: e.data,
        }
    }
}
