//! Generic keyed single-instance cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Maps a key to exactly one shared instance of `V`.
///
/// Until a key is deleted, every lookup for it yields the same `Arc`, and
/// the factory passed to [`Self::get_or_insert`] runs at most once. The
/// factory runs while the cache lock is held and must not call back into
/// the same cache.
pub struct IdentityCache<V> {
    entries: Mutex<HashMap<String, Arc<V>>>,
}

impl<V> IdentityCache<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the instance cached under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.entries().get(key).cloned()
    }

    /// Returns the cached instance, or builds, stores and returns a new one.
    pub fn get_or_insert<F>(&self, key: &str, factory: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        let mut entries = self.entries();
        if let Some(existing) = entries.get(key) {
            return Arc::clone(existing);
        }
        let value = Arc::new(factory());
        entries.insert(key.to_string(), Arc::clone(&value));
        value
    }

    /// Like [`Self::get_or_insert`] for fallible construction. A failing
    /// factory leaves the cache untouched.
    pub fn try_get_or_insert<F, E>(&self, key: &str, factory: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let mut entries = self.entries();
        if let Some(existing) = entries.get(key) {
            return Ok(Arc::clone(existing));
        }
        let value = Arc::new(factory()?);
        entries.insert(key.to_string(), Arc::clone(&value));
        Ok(value)
    }

    /// Stores an already-shared instance unless one is cached. Returns the
    /// instance that is cached afterwards.
    pub fn insert_if_absent(&self, key: &str, value: Arc<V>) -> Arc<V> {
        Arc::clone(self.entries().entry(key.to_string()).or_insert(value))
    }

    /// Removes the instance cached under `key`.
    pub fn delete(&self, key: &str) -> Option<Arc<V>> {
        self.entries().remove(key)
    }

    /// Removes every entry and returns them.
    pub fn clear(&self) -> Vec<Arc<V>> {
        self.entries().drain().map(|(_, value)| value).collect()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Snapshot of the cached keys, in no particular order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    /// Snapshot of the cached instances, in no particular order.
    #[must_use]
    pub fn values(&self) -> Vec<Arc<V>> {
        self.entries().values().cloned().collect()
    }
}

impl<V> Default for IdentityCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for IdentityCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("len", &self.len())
            .finish()
    }
}
