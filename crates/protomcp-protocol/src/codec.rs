//! Encode/decode JSON-RPC 2.0 envelopes.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use protomcp_types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// A single in-memory envelope variant.
#[derive(Debug, Clone)]
pub enum Message {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
}

/// One decoded unit of wire traffic: either a single message or a batch.
#[derive(Debug, Clone)]
pub enum Frame {
    Single(Message),
    Batch(Vec<Message>),
}

/// Errors raised while decoding or encoding the wire format.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The parsed JSON value is neither a request, a notification, nor a
    /// response (missing the fields that would let it be classified).
    #[error("malformed envelope: {0}")]
    Malformed(String),
}

/// Classify a parsed JSON object as a request, notification, or response.
///
/// - has `id` and `method` => request
/// - has `method` only => notification
/// - has `id` and exactly one of `result`/`error` => response
/// - anything else => malformed
pub fn classify(value: Value) -> Result<Message, CodecError> {
    if !value.is_object() {
        return Err(CodecError::Malformed("expected a JSON object".into()));
    }

    let has_id = value.get("id").is_some();
    let has_method = value.get("method").is_some();
    let has_result = value.get("result").is_some();
    let has_error = value.get("error").is_some();

    if has_id && has_method {
        let req: JsonRpcRequest = serde_json::from_value(value)?;
        return Ok(Message::Request(req));
    }
    if has_method && !has_id {
        let notif: JsonRpcNotification = serde_json::from_value(value)?;
        return Ok(Message::Notification(notif));
    }
    if has_id && (has_result ^ has_error) {
        let resp: JsonRpcResponse = serde_json::from_value(value)?;
        return Ok(Message::Response(resp));
    }

    Err(CodecError::Malformed(format!(
        "could not classify envelope (id={has_id}, method={has_method}, result={has_result}, error={has_error})"
    )))
}

/// Decode one frame of wire bytes.
///
/// Reads a single [`serde_json::Value`] first, then dispatches on whether it
/// is an object (single envelope) or an array (batch) — never attempts
/// single-then-array parsing against the same decoder.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let value: Value = serde_json::from_slice(bytes)?;
    match value {
        Value::Array(items) => {
            let mut messages = Vec::with_capacity(items.len());
            for item in items {
                match classify(item) {
                    Ok(msg) => messages.push(msg),
                    Err(e) => {
                        warn!(error = %e, "dropping malformed message inside batch");
                    }
                }
            }
            Ok(Frame::Batch(messages))
        }
        Value::Object(_) => classify(value).map(Frame::Single),
        other => Err(CodecError::Malformed(format!(
            "expected object or array, got {other:?}"
        ))),
    }
}

/// Serialize a single message to its JSON-RPC wire bytes (no trailing
/// newline; stream transports append that themselves).
pub fn encode_message(message: &Message) -> Result<Vec<u8>, CodecError> {
    let bytes = match message {
        Message::Request(req) => serde_json::to_vec(req)?,
        Message::Notification(notif) => serde_json::to_vec(notif)?,
        Message::Response(resp) => serde_json::to_vec(resp)?,
    };
    debug!(bytes = bytes.len(), "encoded message");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_request() {
        let value = json!({"jsonrpc":"2.0","id":"1","method":"tools/list"});
        let msg = classify(value).unwrap();
        assert!(matches!(msg, Message::Request(_)));
    }

    #[test]
    fn classifies_notification() {
        let value = json!({"jsonrpc":"2.0","method":"notifications/tools/list_changed"});
        let msg = classify(value).unwrap();
        assert!(matches!(msg, Message::Notification(_)));
    }

    #[test]
    fn classifies_success_response() {
        let value = json!({"jsonrpc":"2.0","id":"1","result":{}});
        let msg = classify(value).unwrap();
        assert!(matches!(msg, Message::Response(_)));
    }

    #[test]
    fn classifies_error_response() {
        let value = json!({"jsonrpc":"2.0","id":"1","error":{"code":-32601,"message":"x"}});
        let msg = classify(value).unwrap();
        assert!(matches!(msg, Message::Response(_)));
    }

    #[test]
    fn rejects_ambiguous_both_result_and_error() {
        let value = json!({"jsonrpc":"2.0","id":"1","result":{},"error":{"code":1,"message":"x"}});
        assert!(classify(value).is_err());
    }

    #[test]
    fn decode_frame_dispatches_single_vs_batch() {
        let single = decode_frame(br#"{"jsonrpc":"2.0","id":"1","method":"tools/list"}"#).unwrap();
        assert!(matches!(single, Frame::Single(Message::Request(_))));

        let batch = decode_frame(
            br#"[{"jsonrpc":"2.0","id":"1","method":"tools/list"},{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}]"#,
        )
        .unwrap();
        match batch {
            Frame::Batch(msgs) => assert_eq!(msgs.len(), 2),
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn decode_frame_drops_malformed_entries_in_batch() {
        let batch = decode_frame(br#"[{"jsonrpc":"2.0"}, {"jsonrpc":"2.0","id":"1","method":"x"}]"#).unwrap();
        match batch {
            Frame::Batch(msgs) => assert_eq!(msgs.len(), 1),
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn top_level_scalar_is_malformed() {
        assert!(decode_frame(b"42").is_err());
    }
}
