//! [`ServerMux`]: the bundle of tool, resource, and prompt registries a
//! [`crate::session::ServerSession`] dispatches against.

use std::sync::{Arc, OnceLock};

use serde_json::Value;

use protomcp_types::{Content, McpError, Prompt, PromptMessage, Resource, Tool};

use crate::handlers::{PromptHandler, ResourceHandler, ToolHandler};
use crate::registry::{PromptRegistry, ResourceRegistry, ToolRegistry};

/// The full set of server-side handler registries for one server (shared
/// across every session it accepts).
#[derive(Default)]
pub struct ServerMux {
    tools: ToolRegistry,
    resources: ResourceRegistry,
    prompts: PromptRegistry,
}

impl ServerMux {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_tool(&self, tool: Tool, handler: Arc<dyn ToolHandler>) {
        self.tools.register(tool.name.clone(), tool, handler);
    }

    pub fn handle_resource(&self, resource: Resource, handler: Arc<dyn ResourceHandler>) {
        self.resources.register(resource.uri.clone(), resource, handler);
    }

    pub fn handle_prompt(&self, prompt: Prompt, handler: Arc<dyn PromptHandler>) {
        self.prompts.register(prompt.name.clone(), prompt, handler);
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.list()
    }

    #[must_use]
    pub fn list_resources(&self) -> Vec<Resource> {
        self.resources.list()
    }

    #[must_use]
    pub fn list_prompts(&self) -> Vec<Prompt> {
        self.prompts.list()
    }

    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<Vec<Content>, McpError> {
        match self.tools.find(name) {
            Some(handler) => handler.call(arguments).await,
            None => Err(McpError::tool_not_found(name)),
        }
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Vec<Content>, McpError> {
        match self.resources.find(uri) {
            Some(handler) => handler.read(uri).await,
            None => Err(McpError::resource_not_found(uri)),
        }
    }

    pub async fn get_prompt(&self, name: &str, arguments: Option<Value>) -> Result<Vec<PromptMessage>, McpError> {
        match self.prompts.find(name) {
            Some(handler) => handler.get(arguments).await,
            None => Err(McpError::prompt_not_found(name)),
        }
    }

    /// Record that the peer wants `notifications/resources/updated` for `uri`.
    /// Fails with resource-not-found if nothing is registered at that URI.
    pub fn subscribe_resource(&self, uri: &str) -> Result<(), McpError> {
        if self.resources.find(uri).is_none() {
            return Err(McpError::resource_not_found(uri));
        }
        self.resources.subscribe(uri);
        Ok(())
    }

    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    #[must_use]
    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    #[must_use]
    pub fn prompts(&self) -> &PromptRegistry {
        &self.prompts
    }
}

static DEFAULT_SERVER_MUX: OnceLock<Arc<ServerMux>> = OnceLock::new();

/// The process-wide default mux, for quick single-binary programs. Any
/// deployment with more than one server in-process should build its own
/// [`ServerMux`] explicitly rather than share this one.
#[must_use]
pub fn default_server_mux() -> Arc<ServerMux> {
    DEFAULT_SERVER_MUX.get_or_init(|| Arc::new(ServerMux::new())).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(&self, arguments: Option<Value>) -> Result<Vec<Content>, McpError> {
            Ok(vec![Content::binary("application/json", arguments.unwrap_or(Value::Null))])
        }
    }

    #[tokio::test]
    async fn calling_unregistered_tool_is_not_found() {
        let mux = ServerMux::new();
        let err = mux.call_tool("missing", None).await.unwrap_err();
        assert_eq!(err.code, -32001);
    }

    #[tokio::test]
    async fn registered_tool_is_listed_and_callable() {
        let mux = ServerMux::new();
        mux.handle_tool(Tool::new("echo", serde_json::json!({})), Arc::new(Echo));

        assert_eq!(mux.list_tools().len(), 1);
        let out = mux.call_tool("echo", Some(serde_json::json!(42))).await.unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn subscribing_to_unregistered_resource_fails() {
        let mux = ServerMux::new();
        let err = mux.subscribe_resource("file:///missing").unwrap_err();
        assert_eq!(err.code, -32002);
    }

    #[test]
    fn default_mux_is_a_stable_singleton() {
        let a = default_server_mux();
        let b = default_server_mux();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
