//! # protomcp-protocol
//!
//! The framing codec: translation between in-memory envelope variants
//! (request, notification, response) and JSON-RPC 2.0 bytes.
//!
//! Batches are decoded by reading a single [`serde_json::Value`] and
//! dispatching on whether it is an object or an array — not by attempting a
//! single-object parse followed by an array parse against the same
//! decoder, which cannot work against a streaming source.

mod codec;
mod id;
mod registry;

pub use codec::{CodecError, Frame, Message, classify, decode_frame, encode_message};
pub use id::IdGenerator;
pub use registry::{DefinitionList, Registry};

pub use protomcp_types as types;
