//! A generic insertion-ordered handler registry.
//!
//! Every kind of MCP handler table — tools, resources, prompts, roots,
//! samplers — follows the same shape: register by key (re-registering an
//! existing key replaces it in place rather than appending), list in
//! registration order, look a key up, and wake a waiter whenever the set
//! changes so a `notifications/*/list_changed` can go out. This type
//! captures that shape once instead of five near-identical copies.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

struct Inner<D, H> {
    list: Vec<D>,
    index: HashMap<String, usize>,
    handlers: HashMap<String, Arc<H>>,
}

/// A keyed, insertion-ordered table of `(definition, handler)` pairs.
pub struct Registry<D, H> {
    inner: Mutex<Inner<D, H>>,
    changed: Arc<Notify>,
}

impl<D, H> Default for Registry<D, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, H> Registry<D, H> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                list: Vec::new(),
                index: HashMap::new(),
                handlers: HashMap::new(),
            }),
            changed: Arc::new(Notify::new()),
        }
    }

    /// Register (or replace) the handler for `key`. Replacing an existing
    /// key updates its definition in place, preserving its original
    /// position in [`Registry::list`].
    pub fn register(&self, key: impl Into<String>, def: D, handler: Arc<H>) {
        let key = key.into();
        let mut inner = self.inner.lock();
        match inner.index.get(&key).copied() {
            Some(index) => inner.list[index] = def,
            None => {
                let index = inner.list.len();
                inner.list.push(def);
                inner.index.insert(key.clone(), index);
            }
        }
        inner.handlers.insert(key, handler);
        drop(inner);
        self.changed.notify_waiters();
    }

    /// Snapshot the registered definitions in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<D>
    where
        D: Clone,
    {
        self.inner.lock().list.clone()
    }

    /// Look up the handler registered for `key`.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<Arc<H>> {
        self.inner.lock().handlers.get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A handle a background task can await to learn the set changed.
    #[must_use]
    pub fn change_signal(&self) -> Arc<Notify> {
        self.changed.clone()
    }
}

/// A plain insertion-ordered list with no per-entry handler, for registries
/// like roots that are just data the session exposes.
pub struct DefinitionList<D> {
    inner: Mutex<Inner<D, ()>>,
    changed: Arc<Notify>,
}

impl<D> Default for DefinitionList<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> DefinitionList<D> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                list: Vec::new(),
                index: HashMap::new(),
                handlers: HashMap::new(),
            }),
            changed: Arc::new(Notify::new()),
        }
    }

    pub fn register(&self, key: impl Into<String>, def: D) {
        let key = key.into();
        let mut inner = self.inner.lock();
        match inner.index.get(&key).copied() {
            Some(index) => inner.list[index] = def,
            None => {
                let index = inner.list.len();
                inner.list.push(def);
                inner.index.insert(key, index);
            }
        }
        drop(inner);
        self.changed.notify_waiters();
    }

    #[must_use]
    pub fn list(&self) -> Vec<D>
    where
        D: Clone,
    {
        self.inner.lock().list.clone()
    }

    #[must_use]
    pub fn change_signal(&self) -> Arc<Notify> {
        self.changed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_registering_a_key_replaces_in_place() {
        let reg: Registry<&'static str, ()> = Registry::new();
        reg.register("a", "first", Arc::new(()));
        reg.register("b", "second", Arc::new(()));
        reg.register("a", "first-updated", Arc::new(()));

        assert_eq!(reg.list(), vec!["first-updated", "second"]);
    }

    #[test]
    fn find_returns_none_for_unregistered_key() {
        let reg: Registry<&'static str, ()> = Registry::new();
        assert!(reg.find("missing").is_none());
    }

    #[tokio::test]
    async fn registering_wakes_a_change_waiter() {
        let reg: Registry<&'static str, ()> = Registry::new();
        let signal = reg.change_signal();

        let waiter = tokio::spawn(async move {
            signal.notified().await;
        });
        tokio::task::yield_now().await;
        reg.register("a", "first", Arc::new(()));

        tokio::time::timeout(std::time::Duration::from_millis(200), waiter)
            .await
            .expect("waiter should have woken")
            .unwrap();
    }
}
