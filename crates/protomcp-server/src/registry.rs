//! Server-side handler registries: thin aliases over the shared
//! [`protomcp_protocol::Registry`], one per definition kind.

use std::sync::Arc;

use protomcp_protocol::Registry;
use protomcp_types::{Prompt, Resource, Tool};

use crate::handlers::{PromptHandler, ResourceHandler, ToolHandler};

pub type ToolRegistry = Registry<Tool, dyn ToolHandler>;
pub type PromptRegistry = Registry<Prompt, dyn PromptHandler>;

/// The resource registry additionally tracks which URIs the current peer has
/// subscribed to; `notifications/resources/updated` carries a `uri` and so
/// is pushed explicitly per-URI by [`crate::session::ServerSession::notify_resource_updated`]
/// rather than through the parameterless change-broadcaster used for
/// `list_changed`.
pub struct ResourceRegistry {
    inner: Registry<Resource, dyn ResourceHandler>,
    subscribed: parking_lot::Mutex<std::collections::HashSet<String>>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Registry::new(),
            subscribed: parking_lot::Mutex::new(std::collections::HashSet::new()),
        }
    }

    pub fn register(&self, uri: impl Into<String>, def: Resource, handler: Arc<dyn ResourceHandler>) {
        self.inner.register(uri, def, handler);
    }

    #[must_use]
    pub fn list(&self) -> Vec<Resource> {
        self.inner.list()
    }

    #[must_use]
    pub fn find(&self, uri: &str) -> Option<Arc<dyn ResourceHandler>> {
        self.inner.find(uri)
    }

    #[must_use]
    pub fn change_signal(&self) -> Arc<tokio::sync::Notify> {
        self.inner.change_signal()
    }

    /// Record that the current peer asked for updates on `uri`.
    pub fn subscribe(&self, uri: impl Into<String>) {
        self.subscribed.lock().insert(uri.into());
    }

    #[must_use]
    pub fn is_subscribed(&self, uri: &str) -> bool {
        self.subscribed.lock().contains(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_is_tracked_independently_of_registration() {
        let registry = ResourceRegistry::new();
        assert!(!registry.is_subscribed("file:///a"));
        registry.subscribe("file:///a");
        assert!(registry.is_subscribed("file:///a"));
    }
}
