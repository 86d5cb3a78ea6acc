//! Per-collection document cache keyed by primary key.

use crate::IdentityCache;
use std::sync::Arc;
use tracing::debug;

/// Holds the single live wrapper for every document id of a collection.
#[derive(Debug)]
pub struct DocumentCache<D> {
    inner: IdentityCache<D>,
}

impl<D> DocumentCache<D> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: IdentityCache::new(),
        }
    }

    #[must_use]
    pub fn get(&self, doc_id: &str) -> Option<Arc<D>> {
        self.inner.get(doc_id)
    }

    /// Returns the wrapper for `doc_id`, building it on first access.
    pub fn get_or_insert<F>(&self, doc_id: &str, factory: F) -> Arc<D>
    where
        F: FnOnce() -> D,
    {
        self.inner.get_or_insert(doc_id, factory)
    }

    pub fn delete(&self, doc_id: &str) -> Option<Arc<D>> {
        self.inner.delete(doc_id)
    }

    /// Drops every cached wrapper. Called on collection teardown.
    pub fn clear(&self) {
        let dropped = self.inner.clear();
        debug!("Cleared {} cached documents", dropped.len());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<D> Default for DocumentCache<D> {
    fn default() -> Self {
        Self::new()
    }
}
