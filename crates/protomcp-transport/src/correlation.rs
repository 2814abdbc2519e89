//! The correlation core: ID generation, the in-flight outbound table, and
//! the inbound request/notification queues.
//!
//! Shared by every transport adapter. A transport's background reader task
//! (or, for HTTP server, the per-POST handler) feeds decoded messages into
//! [`Correlator::dispatch_response`], [`Correlator::dispatch_request`], and
//! [`Correlator::dispatch_notification`]; the session layer drains
//! `accept_request`/`accept_notification` and resolves outbound futures via
//! `register_outbound`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use protomcp_protocol::IdGenerator;
use protomcp_types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, JsonRpcResponsePayload, RequestId};

use crate::cancellation::CancellationToken;
use crate::error::TransportError;
use crate::queue::Queue;
use crate::response_writer::ResponseWriter;

type OutboundSlot = oneshot::Sender<Result<serde_json::Value, JsonRpcError>>;

/// Per-transport correlation state.
#[derive(Debug)]
pub struct Correlator {
    id_gen: IdGenerator,
    outbound: Mutex<std::collections::HashMap<RequestId, OutboundSlot>>,
    inbound_ids: Mutex<HashSet<RequestId>>,
    request_queue: Queue<(JsonRpcRequest, ResponseWriter)>,
    notification_queue: Queue<protomcp_types::JsonRpcNotification>,
    closed: AtomicBool,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id_gen: IdGenerator::new(),
            outbound: Mutex::new(std::collections::HashMap::new()),
            inbound_ids: Mutex::new(HashSet::new()),
            request_queue: Queue::new(),
            notification_queue: Queue::new(),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn next_id(&self) -> RequestId {
        self.id_gen.next()
    }

    /// Register a fresh outbound slot for `id`, returning the receiving half.
    pub fn register_outbound(&self, id: RequestId) -> oneshot::Receiver<Result<serde_json::Value, JsonRpcError>> {
        let (tx, rx) = oneshot::channel();
        self.outbound.lock().insert(id, tx);
        rx
    }

    /// Immediately fail and remove an outbound slot (used when the write
    /// that was supposed to carry the request fails).
    pub fn fail_outbound(&self, id: &RequestId, err: TransportError) {
        if let Some(tx) = self.outbound.lock().remove(id) {
            let _ = tx.send(Err(JsonRpcError::new(-32000, err.to_string())));
        }
    }

    /// Remove an outbound slot without resolving it (used when a caller's
    /// deadline elapses; a late response for this ID is dropped and logged).
    pub fn forget_outbound(&self, id: &RequestId) {
        self.outbound.lock().remove(id);
    }

    /// Resolve a response against the outbound table. Duplicate or
    /// unmatched responses are logged and dropped.
    pub fn dispatch_response(&self, response: JsonRpcResponse) {
        let Some(id) = response.id.as_request_id().cloned() else {
            warn!("dropping response with null id (not a valid reply target)");
            return;
        };
        let slot = self.outbound.lock().remove(&id);
        match slot {
            Some(tx) => {
                let payload = match response.payload {
                    JsonRpcResponsePayload::Success { result } => Ok(result),
                    JsonRpcResponsePayload::Error { error } => Err(error),
                };
                // The slot's one reader may already have gone away (e.g. the
                // caller cancelled); that's fine, the send is fire-and-forget.
                let _ = tx.send(payload);
            }
            None => {
                warn!(id = %id, "dropping response for unknown or already-resolved request id");
            }
        }
    }

    /// Register and enqueue an inbound request, deduplicating by ID.
    /// Returns the [`ResponseWriter`] the caller should hand to the
    /// dispatched handler; returns `None` if `id` was a duplicate (dropped).
    pub fn dispatch_request(
        &self,
        request: JsonRpcRequest,
        sink: std::sync::Arc<dyn crate::sink::EnvelopeSink>,
    ) -> Option<ResponseWriter> {
        let mut seen = self.inbound_ids.lock();
        if !seen.insert(request.id.clone()) {
            warn!(id = %request.id, "dropping duplicate inbound request id");
            return None;
        }
        drop(seen);

        let writer = ResponseWriter::new(request.id.clone(), sink);
        debug!(id = %request.id, method = %request.method, "enqueueing inbound request");
        self.request_queue.push((request, writer.clone()));
        Some(writer)
    }

    /// Enqueue an inbound notification (no deduplication).
    pub fn dispatch_notification(&self, notification: protomcp_types::JsonRpcNotification) {
        self.notification_queue.push(notification);
    }

    pub async fn accept_request(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(JsonRpcRequest, ResponseWriter), TransportError> {
        self.request_queue.pop(cancel).await
    }

    pub async fn accept_notification(
        &self,
        cancel: &CancellationToken,
    ) -> Result<protomcp_types::JsonRpcNotification, TransportError> {
        self.notification_queue.pop(cancel).await
    }

    /// Session-close ordering: mark closed, resolve every outstanding
    /// outbound slot with a transport-closed error, and drain queues.
    pub fn close(&self, reason: &str) {
        self.closed.store(true, Ordering::SeqCst);
        let pending: Vec<_> = self.outbound.lock().drain().collect();
        for (_, tx) in pending {
            let _ = tx.send(Err(JsonRpcError::new(-32000, format!("transport closed: {reason}"))));
        }
        self.request_queue.clear();
        self.notification_queue.clear();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::EnvelopeSink;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct NullSink;
    #[async_trait]
    impl EnvelopeSink for NullSink {
        async fn send(&self, _bytes: Vec<u8>) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn duplicate_inbound_id_is_dropped() {
        let c = Correlator::new();
        let sink: std::sync::Arc<dyn EnvelopeSink> = std::sync::Arc::new(NullSink);
        let req = JsonRpcRequest::new("7", "tools/list", None);

        assert!(c.dispatch_request(req.clone(), sink.clone()).is_some());
        assert!(c.dispatch_request(req, sink).is_none());
        assert_eq!(c.request_queue.len(), 1);
    }

    #[tokio::test]
    async fn response_resolves_matching_outbound_slot_once() {
        let c = Correlator::new();
        let id = c.next_id();
        let rx = c.register_outbound(id.clone());

        let resp = JsonRpcResponse::success(id.clone(), serde_json::json!(42));
        c.dispatch_response(resp.clone());
        let result = rx.await.unwrap();
        assert_eq!(result.unwrap(), serde_json::json!(42));

        // A second response for the same (now-removed) id is dropped.
        c.dispatch_response(resp);
    }

    #[tokio::test]
    async fn close_resolves_pending_outbound_with_error() {
        let c = Correlator::new();
        let id = c.next_id();
        let rx = c.register_outbound(id);
        c.close("shutdown");
        let result = rx.await.unwrap();
        assert!(result.is_err());
        assert!(c.is_closed());
    }
}
