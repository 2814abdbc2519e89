//! The MCP error taxonomy: JSON-RPC standard codes plus MCP-specific
//! not-found extensions.

use serde_json::Value;
use thiserror::Error;

use crate::jsonrpc::JsonRpcError;

/// A wire error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    JsonRpcInternal,
    McpInternal,
    ToolNotFound,
    ResourceNotFound,
    PromptNotFound,
    RootNotFound,
    SampleNotFound,
    Other(i32),
}

impl ErrorCode {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32602,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::JsonRpcInternal => -32603,
            Self::McpInternal => -32000,
            Self::ToolNotFound => -32001,
            Self::ResourceNotFound => -32002,
            Self::PromptNotFound => -32003,
            Self::RootNotFound => -32004,
            Self::SampleNotFound => -32005,
            Self::Other(code) => code,
        }
    }

    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::JsonRpcInternal => "Internal JSON-RPC error",
            Self::McpInternal => "Internal MCP error",
            Self::ToolNotFound => "Tool not found",
            Self::ResourceNotFound => "Resource not found",
            Self::PromptNotFound => "Prompt not found",
            Self::RootNotFound => "Root not found",
            Self::SampleNotFound => "Sample not found",
            Self::Other(_) => "Application error",
        }
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::JsonRpcInternal,
            -32000 => Self::McpInternal,
            -32001 => Self::ToolNotFound,
            -32002 => Self::ResourceNotFound,
            -32003 => Self::PromptNotFound,
            -32004 => Self::RootNotFound,
            -32005 => Self::SampleNotFound,
            other => Self::Other(other),
        }
    }
}

/// A high-level MCP error, convertible losslessly to and from the wire
/// [`JsonRpcError`].
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
#[non_exhaustive]
pub struct McpError {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

impl McpError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: Value) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: Some(data),
        }
    }

    #[must_use]
    pub fn parse_error(details: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::ParseError, format!("Parse error: {details}"))
    }

    #[must_use]
    pub fn invalid_params(details: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::InvalidParams, format!("Invalid params: {details}"))
    }

    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, format!("Method not found: {method}"))
    }

    #[must_use]
    pub fn tool_not_found(name: &str) -> Self {
        Self::new(ErrorCode::ToolNotFound, format!("Tool not found: {name}"))
    }

    #[must_use]
    pub fn resource_not_found(uri: &str) -> Self {
        Self::new(ErrorCode::ResourceNotFound, format!("Resource not found: {uri}"))
    }

    #[must_use]
    pub fn prompt_not_found(name: &str) -> Self {
        Self::new(ErrorCode::PromptNotFound, format!("Prompt not found: {name}"))
    }

    #[must_use]
    pub fn root_not_found(uri: &str) -> Self {
        Self::new(ErrorCode::RootNotFound, format!("Root not found: {uri}"))
    }

    #[must_use]
    pub fn sample_not_found(id: &str) -> Self {
        Self::new(ErrorCode::SampleNotFound, format!("Sample not found: {id}"))
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::McpInternal, "operation cancelled")
    }
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        match err.data {
            Some(data) => JsonRpcError::with_data(err.code, err.message, data),
            None => JsonRpcError::new(err.code, err.message),
        }
    }
}

impl From<JsonRpcError> for McpError {
    fn from(err: JsonRpcError) -> Self {
        Self {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes_match_spec() {
        assert_eq!(ErrorCode::ToolNotFound.code(), -32001);
        assert_eq!(ErrorCode::ResourceNotFound.code(), -32002);
        assert_eq!(ErrorCode::PromptNotFound.code(), -32003);
        assert_eq!(ErrorCode::RootNotFound.code(), -32004);
        assert_eq!(ErrorCode::SampleNotFound.code(), -32005);
    }

    #[test]
    fn round_trips_through_jsonrpc_error() {
        let err = McpError::tool_not_found("get_weather");
        let wire: JsonRpcError = err.clone().into();
        let back: McpError = wire.into();
        assert_eq!(back.code, err.code);
        assert_eq!(back.message, err.message);
    }
}
