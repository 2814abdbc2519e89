//! The common `Transport` contract implemented by every adapter.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;

use protomcp_types::{JsonRpcError, JsonRpcNotification, JsonRpcRequest};

use crate::cancellation::CancellationToken;
use crate::error::{TransportError, TransportResult};
use crate::response_writer::ResponseWriter;

/// A future-like handle to an in-flight outbound request's eventual reply.
///
/// Produced by [`Transport::request`]; resolves when the matching response
/// arrives or the transport fails/closes.
pub struct PendingResponse {
    rx: oneshot::Receiver<Result<Value, JsonRpcError>>,
}

impl PendingResponse {
    #[must_use]
    pub fn new(rx: oneshot::Receiver<Result<Value, JsonRpcError>>) -> Self {
        Self { rx }
    }

    /// Await the eventual result.
    pub async fn wait(self) -> TransportResult<Value> {
        match self.rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(TransportError::Closed("response slot dropped".into())),
        }
    }
}

/// The uniform contract every transport adapter satisfies.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Fire-and-forget send; returns a future resolved when the matching
    /// response arrives or the transport fails.
    async fn request(&self, method: &str, params: Option<Value>) -> TransportResult<PendingResponse>;

    /// Send a request and block until the response arrives, `cancel` fires,
    /// or the transport fails.
    async fn request_sync(
        &self,
        cancel: &CancellationToken,
        method: &str,
        params: Option<Value>,
    ) -> TransportResult<Value> {
        let pending = self.request(method, params).await?;
        tokio::select! {
            result = pending.wait() => result,
            () = cancel.cancelled() => Err(TransportError::Cancelled),
        }
    }

    /// Fire-and-forget send with no reply expected.
    async fn notify(&self, method: &str, params: Option<Value>) -> TransportResult<()>;

    /// Block until an inbound request is available or `cancel` fires.
    async fn accept_request(
        &self,
        cancel: &CancellationToken,
    ) -> TransportResult<(JsonRpcRequest, ResponseWriter)>;

    /// Block until an inbound notification is available or `cancel` fires.
    async fn accept_notification(&self, cancel: &CancellationToken) -> TransportResult<JsonRpcNotification>;

    /// Idempotent shutdown.
    async fn close(&self) -> TransportResult<()> {
        self.close_with_error(TransportError::Closed("closed by caller".into())).await
    }

    /// Idempotent shutdown with an explicit reason, surfaced to every
    /// pending outbound future and every future `accept-*` call.
    async fn close_with_error(&self, err: TransportError) -> TransportResult<()>;
}
