//! Handler traits invoked when the connected server calls back into this
//! client (`sampling/createMessage`).
//!
//! Roots have no callback: the client just exposes a static list, so
//! [`crate::mux::ClientMux`] keeps that as a plain [`protomcp_protocol::DefinitionList`]
//! rather than a handler registry.

use async_trait::async_trait;
use serde_json::Value;

use protomcp_types::{McpError, SamplingMessage};

/// Serves one `sampling/createMessage` invocation from the connected server.
#[async_trait]
pub trait SampleHandler: Send + Sync {
    async fn sample(&self, params: Option<Value>) -> Result<SamplingMessage, McpError>;
}

/// Adapts a plain async closure into a [`SampleHandler`], mirroring the
/// server side's `ToolHandlerFn` convenience for callers that don't need
/// their own state.
pub struct SampleHandlerFn<F>(pub F);

#[async_trait]
impl<F, Fut> SampleHandler for SampleHandlerFn<F>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<SamplingMessage, McpError>> + Send,
{
    async fn sample(&self, params: Option<Value>) -> Result<SamplingMessage, McpError> {
        (self.0)(params).await
    }
}
