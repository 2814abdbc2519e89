//! The enumerated set of wire methods this engine recognizes.

use std::fmt;

/// A recognized MCP wire method.
///
/// Any method string not covered here is routed to a not-found handler by
/// the dispatch layer rather than rejected at the type level, since unknown
/// methods are a normal runtime occurrence (older/newer peers, typos).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Initialize,
    ToolsList,
    ToolsCall,
    NotifyToolsListChanged,
    ResourcesList,
    ResourcesRead,
    ResourcesSubscribe,
    NotifyResourcesListChanged,
    NotifyResourcesUpdated,
    PromptsList,
    PromptsGet,
    NotifyPromptsListChanged,
    LoggingSetLevel,
    SamplingCreateMessage,
    RootsList,
    NotifyRootsListChanged,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
            Self::NotifyToolsListChanged => "notifications/tools/list_changed",
            Self::ResourcesList => "resources/list",
            Self::ResourcesRead => "resources/read",
            Self::ResourcesSubscribe => "resources/subscribe",
            Self::NotifyResourcesListChanged => "notifications/resources/list_changed",
            Self::NotifyResourcesUpdated => "notifications/resources/updated",
            Self::PromptsList => "prompts/list",
            Self::PromptsGet => "prompts/get",
            Self::NotifyPromptsListChanged => "notifications/prompts/list_changed",
            Self::LoggingSetLevel => "logging/setLevel",
            Self::SamplingCreateMessage => "sampling/createMessage",
            Self::RootsList => "roots/list",
            Self::NotifyRootsListChanged => "notifications/roots/list_changed",
        }
    }

    /// Parse a wire method string, returning `None` for anything unrecognized.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "initialize" => Self::Initialize,
            "tools/list" => Self::ToolsList,
            "tools/call" => Self::ToolsCall,
            "notifications/tools/list_changed" => Self::NotifyToolsListChanged,
            "resources/list" => Self::ResourcesList,
            "resources/read" => Self::ResourcesRead,
            "resources/subscribe" => Self::ResourcesSubscribe,
            "notifications/resources/list_changed" => Self::NotifyResourcesListChanged,
            "notifications/resources/updated" => Self::NotifyResourcesUpdated,
            "prompts/list" => Self::PromptsList,
            "prompts/get" => Self::PromptsGet,
            "notifications/prompts/list_changed" => Self::NotifyPromptsListChanged,
            "logging/setLevel" => Self::LoggingSetLevel,
            "sampling/createMessage" => Self::SamplingCreateMessage,
            "roots/list" => Self::RootsList,
            "notifications/roots/list_changed" => Self::NotifyRootsListChanged,
            _ => return None,
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        let all = [
            Method::Initialize,
            Method::ToolsList,
            Method::ToolsCall,
            Method::NotifyToolsListChanged,
            Method::ResourcesList,
            Method::ResourcesRead,
            Method::ResourcesSubscribe,
            Method::NotifyResourcesListChanged,
            Method::NotifyResourcesUpdated,
            Method::PromptsList,
            Method::PromptsGet,
            Method::NotifyPromptsListChanged,
            Method::LoggingSetLevel,
            Method::SamplingCreateMessage,
            Method::RootsList,
            Method::NotifyRootsListChanged,
        ];
        for m in all {
            assert_eq!(Method::parse(m.as_str()), Some(m));
        }
    }

    #[test]
    fn unknown_method_is_none() {
        assert_eq!(Method::parse("totally/unknown"), None);
    }
}
