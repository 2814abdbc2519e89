//! # protomcp-types
//!
//! Wire types for the Model Context Protocol: JSON-RPC 2.0 envelopes, the
//! method enum, protocol version, capability maps, definition records
//! (tool/resource/prompt/root/sampling), and the tagged content value.
//!
//! This crate holds no I/O and no async runtime dependency — it is the
//! single source of truth for what goes on the wire, shared by the
//! transport, server, and client crates.

mod capabilities;
mod content;
mod definitions;
mod error;
mod jsonrpc;
mod method;
mod version;

pub use capabilities::Capabilities;
pub use content::{Content, marshal_contents, unmarshal_contents};
pub use definitions::{
    Implementation, Prompt, PromptArgument, PromptMessage, Resource, ResourceContents, Root,
    SamplingMessage, Tool,
};
pub use error::{ErrorCode, McpError};
pub use jsonrpc::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId, ResponseId,
};
pub use method::Method;
pub use version::ProtocolVersion;
