//! Capability negotiation: a two-level `feature -> flag -> bool` map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A capability map: `feature name -> flag name -> enabled`.
///
/// Example wire shape: `{"tools":{"listChanged":true},
/// "resources":{"subscribe":true,"listChanged":false}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(BTreeMap<String, BTreeMap<String, bool>>);

impl Capabilities {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `feature.flag = true`.
    pub fn enable(&mut self, feature: impl Into<String>, flag: impl Into<String>) -> &mut Self {
        self.0.entry(feature.into()).or_default().insert(flag.into(), true);
        self
    }

    /// Set `feature.flag = false`.
    pub fn disable(&mut self, feature: impl Into<String>, flag: impl Into<String>) -> &mut Self {
        self.0.entry(feature.into()).or_default().insert(flag.into(), false);
        self
    }

    /// Merge `other` into `self`, left-biased: a feature key already present
    /// in `self` is left untouched even if `other` carries the same key.
    ///
    /// This makes `merge` asymmetric by design: `merge(required, merge(required, defaults))
    /// == merge(required, defaults)`, so a caller can impose required capabilities
    /// before layering defaults without the defaults clobbering them.
    #[must_use]
    pub fn merge(mut self, other: Capabilities) -> Self {
        for (feature, flags) in other.0 {
            self.0.entry(feature).or_insert(flags);
        }
        self
    }

    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.0.contains_key(feature)
    }

    #[must_use]
    pub fn has_capability(&self, feature: &str, flag: &str) -> bool {
        self.0.get(feature).and_then(|flags| flags.get(flag)).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_left_biased() {
        let mut a = Capabilities::new();
        a.enable("tools", "listChanged");

        let mut b = Capabilities::new();
        b.disable("tools", "listChanged");
        b.enable("resources", "subscribe");

        let merged = a.clone().merge(b.clone());
        assert!(merged.has_capability("tools", "listChanged"));
        assert!(merged.has_capability("resources", "subscribe"));

        // merge(a, merge(a, b)) == merge(a, b)
        let once = a.clone().merge(b.clone());
        let twice = a.clone().merge(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn query_reflects_absence() {
        let c = Capabilities::new();
        assert!(!c.has_feature("tools"));
        assert!(!c.has_capability("tools", "listChanged"));
    }

    #[test]
    fn wire_shape_round_trips() {
        let mut c = Capabilities::new();
        c.enable("tools", "listChanged");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["tools"]["listChanged"], true);
        let back: Capabilities = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }
}
