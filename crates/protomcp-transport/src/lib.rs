//! # protomcp-transport
//!
//! Transport adapters and the correlation core shared by every adapter:
//! stdio/stream, HTTP client with an SSE back-channel, and HTTP server with
//! an SSE back-channel.
//!
//! Every transport implements the same [`Transport`] trait so the session
//! layer above is transport-agnostic.

mod cancellation;
mod config;
mod correlation;
mod error;
mod http_client;
mod http_server;
mod queue;
mod response_writer;
mod sink;
mod stdio;
mod transport;

pub use cancellation::CancellationToken;
pub use config::{HttpClientConfig, HttpServerConfig, RetryPolicy, StdioTransportConfig};
pub use correlation::Correlator;
pub use error::{TransportError, TransportResult};
pub use http_client::HttpClientTransport;
pub use http_server::{HttpServerTransport, SessionId, SharedSessionRegistry, router as http_server_router};
pub use response_writer::ResponseWriter;
pub use sink::EnvelopeSink;
pub use stdio::StdioTransport;
pub use transport::{PendingResponse, Transport};

pub use protomcp_protocol as protocol;
pub use protomcp_types as types;
