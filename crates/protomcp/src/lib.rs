//! # protomcp
//!
//! A bidirectional MCP (Model Context Protocol) peer engine: a JSON-RPC 2.0
//! transport layer, a correlation/dispatch core, session lifecycles for
//! both sides of a connection, and the handler registries a server or
//! client hangs its tools/resources/prompts/roots/sampling off of.
//!
//! This crate is a thin facade over five lower-level crates — pull in
//! [`protomcp::server`] or [`protomcp::client`] directly if you only need
//! one side of a connection and want to shrink your dependency footprint.
//!
//! ## Quick start (server)
//!
//! ```no_run
//! use protomcp::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mux = Arc::new(ServerMux::new());
//! let transport: Arc<dyn Transport> = Arc::new(StdioTransport::new());
//! let session = ServerSession::accept(transport, mux, ServerOptions::default()).await?;
//! session.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Quick start (client)
//!
//! ```no_run
//! use protomcp::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mux = Arc::new(ClientMux::new());
//! let transport: Arc<dyn Transport> = Arc::new(StdioTransport::new());
//! let session = ClientSession::dial(transport, mux, ClientOptions::default()).await?;
//! let cancel = CancellationToken::new();
//! let _tools = session.list_tools(&cancel).await?;
//! # Ok(())
//! # }
//! ```

pub use protomcp_types as types;

pub use protomcp_protocol as protocol;

pub use protomcp_transport as transport;

pub use protomcp_server as server;

pub use protomcp_client as client;

/// Everything most callers need in scope, across both peer roles.
pub mod prelude {
    pub use protomcp_client::{ClientError, ClientMux, ClientOptions, ClientSession, SampleHandler, SampleHandlerFn};
    pub use protomcp_server::{
        PromptHandler, PromptHandlerFn, ResourceHandler, ResourceHandlerFn, ServerError, ServerMux, ServerOptions,
        ServerSession, ToolHandler, ToolHandlerFn,
    };
    pub use protomcp_transport::{CancellationToken, HttpClientTransport, HttpServerTransport, StdioTransport, Transport, TransportError};
    pub use protomcp_types::{
        Capabilities, Content, ErrorCode, Implementation, McpError, Method, Prompt, PromptArgument, PromptMessage,
        ProtocolVersion, Resource, ResourceContents, Root, SamplingMessage, Tool,
    };
}
