//! JSON-RPC 2.0 envelope types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC version marker, always serialized/deserialized as `"2.0"`.
pub const JSONRPC_VERSION: &str = "2.0";

fn is_jsonrpc_version(v: &str) -> bool {
    v == JSONRPC_VERSION
}

/// A request identifier.
///
/// The canonical form produced by this engine's ID generator is a decimal
/// integer rendered as a string, but the wire representation accepts either
/// a string or a number since JSON-RPC itself allows both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String identifier (the canonical form this engine emits).
    String(String),
    /// Numeric identifier, accepted on decode for interop.
    Number(i64),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        Self::String(n.to_string())
    }
}

/// A JSON-RPC request: has both `id` and `method`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc", deserialize_with = "deserialize_version")]
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    #[must_use]
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC notification: `method` only, no `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc", deserialize_with = "deserialize_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC error object, embedded in an error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// The `id` field of a response. Parse errors have no associated request so
/// this may be `null` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(pub Option<RequestId>);

impl ResponseId {
    #[must_use]
    pub fn from_request(id: RequestId) -> Self {
        Self(Some(id))
    }

    #[must_use]
    pub fn null() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn as_request_id(&self) -> Option<&RequestId> {
        self.0.as_ref()
    }
}

/// A JSON-RPC response: `id` and exactly one of `result`/`error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc", deserialize_with = "deserialize_version")]
    pub jsonrpc: String,
    pub id: ResponseId,
    #[serde(flatten)]
    pub payload: JsonRpcResponsePayload,
}

/// The mutually-exclusive success/error half of a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponsePayload {
    Success { result: Value },
    Error { error: JsonRpcError },
}

impl JsonRpcResponse {
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: ResponseId::from_request(id),
            payload: JsonRpcResponsePayload::Success { result },
        }
    }

    #[must_use]
    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: ResponseId::from_request(id),
            payload: JsonRpcResponsePayload::Error { error },
        }
    }

    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: ResponseId::null(),
            payload: JsonRpcResponsePayload::Error {
                error: JsonRpcError::new(-32700, message),
            },
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.payload, JsonRpcResponsePayload::Success { .. })
    }

    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            JsonRpcResponsePayload::Success { result } => Some(result),
            JsonRpcResponsePayload::Error { .. } => None,
        }
    }

    #[must_use]
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match self.payload {
            JsonRpcResponsePayload::Success { result } => Ok(result),
            JsonRpcResponsePayload::Error { error } => Err(error),
        }
    }
}

fn deserialize_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if !is_jsonrpc_version(&s) {
        return Err(serde::de::Error::custom(format!(
            "unsupported jsonrpc version: {s}"
        )));
    }
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_display() {
        let id: RequestId = "7".into();
        assert_eq!(id.to_string(), "7");
    }

    #[test]
    fn response_round_trips_success() {
        let resp = JsonRpcResponse::success("1".into(), serde_json::json!({"ok": true}));
        let wire = serde_json::to_string(&resp).unwrap();
        let back: JsonRpcResponse = serde_json::from_str(&wire).unwrap();
        assert!(back.is_success());
        assert_eq!(back.result().unwrap()["ok"], true);
    }

    #[test]
    fn request_rejects_wrong_jsonrpc_version() {
        let raw = r#"{"jsonrpc":"1.0","id":"1","method":"ping"}"#;
        let parsed: Result<JsonRpcRequest, _> = serde_json::from_str(raw);
        assert!(parsed.is_err());
    }
}
