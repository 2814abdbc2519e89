//! # protomcp-client
//!
//! Client-side session lifecycle: the `initialize` handshake, tool/resource/
//! prompt call helpers, and the registries ([`ClientMux`]) that answer the
//! server's `roots/list` and `sampling/createMessage` callbacks.
//!
//! A client builds a [`ClientMux`], registers roots and (optionally) a
//! sampling handler against it, then calls [`ClientSession::dial`] once per
//! outbound transport connection.

mod error;
mod handlers;
mod mux;
mod session;

pub use error::{ClientError, ClientResult};
pub use handlers::{SampleHandler, SampleHandlerFn};
pub use mux::ClientMux;
pub use session::{ClientOptions, ClientSession, ResourceSubscription, ResourceUpdate};

pub use protomcp_transport as transport;
pub use protomcp_types as types;
