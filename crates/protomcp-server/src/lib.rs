//! # protomcp-server
//!
//! Server-side session lifecycle, handler registries (tool/resource/prompt
//! muxes), and the `initialize` handshake responder.
//!
//! A server builds a [`ServerMux`], registers tools/resources/prompts
//! against it, then calls [`ServerSession::accept`] once per incoming
//! transport connection. Each accepted session dispatches inbound requests
//! against the shared mux and runs its own change-notification broadcasters.

mod error;
mod handlers;
mod mux;
mod registry;
mod session;

pub use error::{ServerError, ServerResult};
pub use handlers::{
    PromptHandler, PromptHandlerFn, ResourceHandler, ResourceHandlerFn, ToolHandler, ToolHandlerFn,
};
pub use mux::{ServerMux, default_server_mux};
pub use registry::{PromptRegistry, ResourceRegistry, ToolRegistry};
pub use session::{ServerOptions, ServerSession};

pub use protomcp_transport as transport;
pub use protomcp_types as types;
