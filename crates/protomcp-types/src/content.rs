//! The tagged content value returned by tool calls, resource reads, and
//! prompt messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::definitions::Resource;

/// A single piece of content.
///
/// The variant is recovered from the JSON shape rather than an explicit
/// `type` tag: presence of a `resource` sub-object selects the `Resource`
/// variant, otherwise the content is `Binary` with `mimeType`/`data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// An embedded resource (used e.g. when a tool result references a
    /// resource the server already exposes).
    Resource { resource: Resource },
    /// Raw bytes tagged with a MIME type.
    Binary {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: Value,
    },
}

impl Content {
    /// Construct a binary content value.
    #[must_use]
    pub fn binary(mime_type: impl Into<String>, data: impl Into<Value>) -> Self {
        Self::Binary {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Construct a resource content value.
    #[must_use]
    pub fn resource(resource: Resource) -> Self {
        Self::Resource { resource }
    }

    /// The content's type tag: the MIME type for binary content, or
    /// `"resource"` for an embedded resource.
    #[must_use]
    pub fn content_type(&self) -> &str {
        match self {
            Self::Binary { mime_type, .. } => mime_type,
            Self::Resource { .. } => "resource",
        }
    }
}

/// Wrap a content list as the `{"contents": [...]}` envelope used on the wire.
#[must_use]
pub fn marshal_contents(contents: &[Content]) -> Value {
    serde_json::json!({ "contents": contents })
}

/// Unwrap the `{"contents": [...]}` envelope, tolerating a bare array for
/// callers that skip the wrapper.
pub fn unmarshal_contents(value: &Value) -> Result<Vec<Content>, serde_json::Error> {
    if let Some(contents) = value.get("contents") {
        serde_json::from_value(contents.clone())
    } else {
        serde_json::from_value(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_shape_discriminates_from_resource() {
        let bin = Content::binary("text/plain", "hello");
        let json = serde_json::to_value(&bin).unwrap();
        assert_eq!(json["mimeType"], "text/plain");

        let back: Content = serde_json::from_value(json).unwrap();
        assert_eq!(back, bin);
    }

    #[test]
    fn resource_shape_discriminates_from_binary() {
        let resource = Resource {
            uri: "file:///x".into(),
            name: "x".into(),
            description: None,
            mime_type: Some("text/plain".into()),
        };
        let content = Content::resource(resource.clone());
        let json = serde_json::to_value(&content).unwrap();
        assert!(json.get("resource").is_some());

        let back: Content = serde_json::from_value(json).unwrap();
        assert_eq!(back, content);
    }

    #[test]
    fn unmarshal_unwraps_contents_envelope() {
        let value = serde_json::json!({
            "contents": [{"mimeType": "text/plain", "data": "hi"}]
        });
        let contents = unmarshal_contents(&value).unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].content_type(), "text/plain");
    }
}
