//! Per-transport request ID generation.

use std::sync::atomic::{AtomicU64, Ordering};

use protomcp_types::RequestId;

/// Generates process-unique, monotonically increasing request IDs.
///
/// One generator is owned per transport instance; uniqueness is only
/// guaranteed within that scope, matching the engine's invariant that
/// outbound request IDs are unique per transport lifetime.
#[derive(Debug, Default)]
pub struct IdGenerator {
    counter: AtomicU64,
}

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the next ID: a decimal integer rendered as a string.
    pub fn next(&self) -> RequestId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        RequestId::from(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_unique() {
        let gen = IdGenerator::new();
        let a = gen.next();
        let b = gen.next();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "1");
        assert_eq!(b.to_string(), "2");
    }
}
