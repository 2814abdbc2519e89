//! Protocol version handling.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A recognized MCP protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(String);

impl ProtocolVersion {
    pub const EXPERIMENTAL: &'static str = "experimental";
    pub const V2024_11_05: &'static str = "2024-11-05";
    pub const V2025_03_26: &'static str = "2025-03-26";

    /// The default version a peer negotiates if it does not ask for one.
    #[must_use]
    pub fn default_version() -> Self {
        Self(Self::EXPERIMENTAL.to_string())
    }

    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is one of the versions this engine understands.
    #[must_use]
    pub fn is_known(&self) -> bool {
        matches!(
            self.0.as_str(),
            Self::EXPERIMENTAL | Self::V2024_11_05 | Self::V2025_03_26
        )
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::default_version()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProtocolVersion {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_experimental() {
        assert_eq!(ProtocolVersion::default().as_str(), "experimental");
    }

    #[test]
    fn historical_versions_are_known() {
        assert!(ProtocolVersion::from("2024-11-05").is_known());
        assert!(ProtocolVersion::from("2025-03-26").is_known());
        assert!(!ProtocolVersion::from("3000-01-01").is_known());
    }
}
