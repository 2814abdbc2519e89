//! Handler traits a server-side registry stores one implementation of per
//! registered key.

use async_trait::async_trait;
use serde_json::Value;

use protomcp_types::{Content, McpError, PromptMessage};

/// Serves one `tools/call` invocation for the tool it is registered under.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Option<Value>) -> Result<Vec<Content>, McpError>;
}

/// Serves one `resources/read` for the resource URI it is registered under.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(&self, uri: &str) -> Result<Vec<Content>, McpError>;
}

/// Serves one `prompts/get` for the prompt name it is registered under.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn get(&self, arguments: Option<Value>) -> Result<Vec<PromptMessage>, McpError>;
}

/// Adapts a plain async closure into a [`ToolHandler`], for handlers that
/// don't need their own state.
pub struct ToolHandlerFn<F>(pub F);

#[async_trait]
impl<F, Fut> ToolHandler for ToolHandlerFn<F>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Vec<Content>, McpError>> + Send,
{
    async fn call(&self, arguments: Option<Value>) -> Result<Vec<Content>, McpError> {
        (self.0)(arguments).await
    }
}

pub struct ResourceHandlerFn<F>(pub F);

#[async_trait]
impl<F, Fut> ResourceHandler for ResourceHandlerFn<F>
where
    F: Fn(&str) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Vec<Content>, McpError>> + Send,
{
    async fn read(&self, uri: &str) -> Result<Vec<Content>, McpError> {
        (self.0)(uri).await
    }
}

pub struct PromptHandlerFn<F>(pub F);

#[async_trait]
impl<F, Fut> PromptHandler for PromptHandlerFn<F>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Vec<PromptMessage>, McpError>> + Send,
{
    async fn get(&self, arguments: Option<Value>) -> Result<Vec<PromptMessage>, McpError> {
        (self.0)(arguments).await
    }
}
