//! [`ClientMux`]: the registries a [`crate::session::ClientSession`]
//! dispatches server-initiated requests against.
//!
//! The client side only ever serves two inbound methods: `roots/list`
//! (answered from a plain registered list, no handler needed) and
//! `sampling/createMessage` (answered by a single registered
//! [`SampleHandler`], since sampling isn't keyed like tools/resources/prompts
//! are — there's exactly one sampling backend per client).

use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use serde_json::Value;

use protomcp_protocol::DefinitionList;
use protomcp_types::{McpError, Root, SamplingMessage};

use crate::handlers::SampleHandler;

/// The full set of client-side registries for one client (shared across
/// every session it dials).
#[derive(Default)]
pub struct ClientMux {
    roots: DefinitionList<Root>,
    sample_handler: SyncMutex<Option<Arc<dyn SampleHandler>>>,
}

impl ClientMux {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose a root to servers that call `roots/list`. Re-registering an
    /// existing URI replaces it in place.
    pub fn register_root(&self, root: Root) {
        self.roots.register(root.uri.clone(), root);
    }

    #[must_use]
    pub fn list_roots(&self) -> Vec<Root> {
        self.roots.list()
    }

    #[must_use]
    pub fn roots_change_signal(&self) -> Arc<tokio::sync::Notify> {
        self.roots.change_signal()
    }

    /// Install the handler that answers `sampling/createMessage`. Replaces
    /// whatever was registered before.
    pub fn set_sample_handler(&self, handler: Arc<dyn SampleHandler>) {
        *self.sample_handler.lock() = Some(handler);
    }

    pub async fn sample(&self, params: Option<Value>) -> Result<SamplingMessage, McpError> {
        let handler = self.sample_handler.lock().clone();
        match handler {
            Some(handler) => handler.sample(params).await,
            None => Err(McpError::sample_not_found("no sampling handler registered")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use protomcp_types::Content;

    struct Echo;

    #[async_trait]
    impl SampleHandler for Echo {
        async fn sample(&self, _params: Option<Value>) -> Result<SamplingMessage, McpError> {
            Ok(SamplingMessage {
                role: "assistant".into(),
                content: Content::binary("text/plain", "hi"),
                model: None,
                stop_reason: None,
            })
        }
    }

    #[tokio::test]
    async fn sampling_without_a_registered_handler_is_not_found() {
        let mux = ClientMux::new();
        let err = mux.sample(None).await.unwrap_err();
        assert_eq!(err.code, -32005);
    }

    #[tokio::test]
    async fn registered_sample_handler_answers() {
        let mux = ClientMux::new();
        mux.set_sample_handler(Arc::new(Echo));
        let msg = mux.sample(None).await.unwrap();
        assert_eq!(msg.role, "assistant");
    }

    #[test]
    fn roots_round_trip_and_replace_in_place() {
        let mux = ClientMux::new();
        mux.register_root(Root::new("file:///a"));
        mux.register_root(Root::new("file:///b"));
        mux.register_root(Root {
            uri: "file:///a".into(),
            name: Some("renamed".into()),
        });

        let roots = mux.list_roots();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].name.as_deref(), Some("renamed"));
    }
}
