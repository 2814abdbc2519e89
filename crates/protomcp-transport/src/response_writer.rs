//! The single-shot reply handle passed to a handler for one inbound request.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use protomcp_protocol::{Message, encode_message};
use protomcp_types::{JsonRpcResponse, RequestId};

use crate::error::{TransportError, TransportResult};
use crate::sink::EnvelopeSink;

/// Lets a handler emit exactly one result or one error for an inbound
/// request. Any write after the first — including a `close_with_error`
/// after a prior `write_result` — fails locally without putting a second
/// message on the wire.
#[derive(Clone)]
pub struct ResponseWriter {
    id: RequestId,
    sink: Arc<dyn EnvelopeSink>,
    replied: Arc<AtomicBool>,
}

impl ResponseWriter {
    #[must_use]
    pub fn new(id: RequestId, sink: Arc<dyn EnvelopeSink>) -> Self {
        Self {
            id,
            sink,
            replied: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.id
    }

    /// Write the single successful reply for this request.
    pub async fn write_result(&self, result: Value) -> TransportResult<()> {
        self.claim()?;
        let response = JsonRpcResponse::success(self.id.clone(), result);
        let bytes = encode_message(&Message::Response(response))?;
        self.sink.send(bytes).await
    }

    /// Write the single error reply for this request.
    pub async fn close_with_error(
        &self,
        code: i32,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> TransportResult<()> {
        self.claim()?;
        let error = match data {
            Some(data) => protomcp_types::JsonRpcError::with_data(code, message, data),
            None => protomcp_types::JsonRpcError::new(code, message),
        };
        let response = JsonRpcResponse::error(self.id.clone(), error);
        let bytes = encode_message(&Message::Response(response))?;
        self.sink.send(bytes).await
    }

    fn claim(&self) -> TransportResult<()> {
        if self.replied.swap(true, Ordering::SeqCst) {
            return Err(TransportError::AlreadyReplied);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("id", &self.id)
            .field("replied", &self.replied.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct CapturingSink(Mutex<Vec<Vec<u8>>>);

    #[async_trait::async_trait]
    impl EnvelopeSink for CapturingSink {
        async fn send(&self, bytes: Vec<u8>) -> TransportResult<()> {
            self.0.lock().push(bytes);
            Ok(())
        }
    }

    #[tokio::test]
    async fn second_write_fails_locally_and_emits_nothing() {
        let sink = Arc::new(CapturingSink::default());
        let writer = ResponseWriter::new("1".into(), sink.clone());

        writer.write_result(serde_json::json!({"ok": true})).await.unwrap();
        let second = writer.write_result(serde_json::json!({"ok": false})).await;

        assert!(matches!(second, Err(TransportError::AlreadyReplied)));
        assert_eq!(sink.0.lock().len(), 1);
    }

    #[tokio::test]
    async fn close_with_error_after_success_is_rejected() {
        let sink = Arc::new(CapturingSink::default());
        let writer = ResponseWriter::new("1".into(), sink.clone());

        writer.write_result(serde_json::json!(null)).await.unwrap();
        let err = writer.close_with_error(-32001, "too late", None).await;

        assert!(matches!(err, Err(TransportError::AlreadyReplied)));
        assert_eq!(sink.0.lock().len(), 1);
    }
}
