//! Query cache keyed by canonical query string.

use crate::{CacheError, CacheResult, IdentityCache};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A live query object that can be deduplicated by the [`QueryCache`].
pub trait CachedQuery: Send + Sync {
    /// Canonical serialization of the normalized query. Two logically
    /// equivalent queries must return the same string.
    fn cache_key(&self) -> &str;

    /// Number of consumers currently subscribed to the query's results.
    fn subscriber_count(&self) -> usize;

    /// Unsubscribes every consumer. Called before the cache is cleared.
    fn release(&self);

    /// Creation time in milliseconds, used to order eviction candidates.
    fn created_at(&self) -> u64 {
        0
    }
}

/// Guarantees at most one live query object per distinct query shape.
pub struct QueryCache<Q> {
    queries: IdentityCache<Q>,
    destroyed: AtomicBool,
}

impl<Q: CachedQuery> QueryCache<Q> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queries: IdentityCache::new(),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Returns the cached query with the same canonical form as `query`, or
    /// caches `query` and returns it.
    ///
    /// The destroyed flag is checked while the cache lock is held, so a
    /// concurrent [`Self::destroy`] either sees the new entry and releases it
    /// or makes this call fail.
    pub fn get_by_query(&self, query: Q) -> CacheResult<Arc<Q>> {
        let key = query.cache_key().to_string();
        self.queries.try_get_or_insert(&key, || {
            if self.is_destroyed() {
                Err(CacheError::Destroyed { key: key.clone() })
            } else {
                Ok(query)
            }
        })
    }

    /// Looks up a query by its canonical string.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<Q>> {
        self.queries.get(key)
    }

    /// Releases and removes a single query.
    pub fn uncache(&self, key: &str) -> Option<Arc<Q>> {
        let removed = self.queries.delete(key);
        if let Some(query) = &removed {
            query.release();
        }
        removed
    }

    /// Evicts queries nobody is subscribed to, keeping the `keep` most
    /// recently created ones. Returns the number of evicted queries.
    pub fn replace_unused(&self, keep: usize) -> usize {
        let mut unused: Vec<Arc<Q>> = self
            .queries
            .values()
            .into_iter()
            .filter(|q| q.subscriber_count() == 0)
            .collect();
        if unused.len() <= keep {
            return 0;
        }

        unused.sort_by_key(|q| std::cmp::Reverse(q.created_at()));
        let evicted = unused.split_off(keep);
        for query in &evicted {
            self.uncache(query.cache_key());
        }
        debug!("Evicted {} unused queries", evicted.len());
        evicted.len()
    }

    /// Releases every held subscription and empties the cache. Further
    /// inserts fail with [`CacheError::Destroyed`].
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        let queries = self.queries.values();
        for query in &queries {
            query.release();
        }
        self.queries.clear();
        debug!("Destroyed query cache with {} queries", queries.len());
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl<Q: CachedQuery> Default for QueryCache<Q> {
    fn default() -> Self {
        Self::new()
    }
}
