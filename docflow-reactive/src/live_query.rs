//! Live query objects shared through the query cache.

use crate::{ReactiveError, ReactiveResult};
use docflow_cache::CachedQuery;
use docflow_query::{
    get_query_matcher, get_sort_comparator, NormalizedQuery, PreparedQuery, QueryMatcher,
    SortComparator,
};
use docflow_types::{now, CollectionSchema};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// A result set as published to subscribers.
pub type QueryResults = Arc<Vec<Value>>;

/// The single live object for one canonical query.
///
/// It owns the compiled matcher and comparator. Deciding when to re-run is up
/// to the caller, which hands the current documents to [`LiveQuery::update`].
pub struct LiveQuery {
    key: String,
    prepared: PreparedQuery,
    matcher: QueryMatcher,
    comparator: SortComparator,
    created_at: u64,
    latest_change_event: AtomicU64,
    results: Mutex<Option<watch::Sender<QueryResults>>>,
}

impl LiveQuery {
    pub fn new(schema: &CollectionSchema, prepared: PreparedQuery) -> ReactiveResult<Self> {
        let matcher = get_query_matcher(schema, &prepared.query)?;
        let comparator = get_sort_comparator(schema, &prepared.query);
        let (results, _) = watch::channel(Arc::new(Vec::new()));
        Ok(Self {
            key: prepared.query.canonical_string(),
            prepared,
            matcher,
            comparator,
            created_at: now(),
            latest_change_event: AtomicU64::new(0),
            results: Mutex::new(Some(results)),
        })
    }

    fn results(&self) -> MutexGuard<'_, Option<watch::Sender<QueryResults>>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn query(&self) -> &NormalizedQuery {
        &self.prepared.query
    }

    pub fn prepared(&self) -> &PreparedQuery {
        &self.prepared
    }

    pub fn matcher(&self) -> &QueryMatcher {
        &self.matcher
    }

    pub fn comparator(&self) -> &SortComparator {
        &self.comparator
    }

    /// Matches, sorts and pages `docs` by this query.
    pub fn apply(&self, docs: &[Value]) -> Vec<Value> {
        let mut matched: Vec<Value> = self.matcher.filter(docs).cloned().collect();
        self.comparator.sort(&mut matched);

        let query = &self.prepared.query;
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));
        matched.into_iter().skip(skip).take(limit).collect()
    }

    /// Recomputes the results from `docs` and publishes them if they differ
    /// from the previous ones. Returns whether subscribers were notified.
    pub fn update(&self, docs: &[Value]) -> bool {
        let next = self.apply(docs);
        match self.results().as_ref() {
            Some(results) => results.send_if_modified(|current| {
                if **current == next {
                    return false;
                }
                *current = Arc::new(next);
                true
            }),
            None => false,
        }
    }

    /// The last published results.
    pub fn current(&self) -> QueryResults {
        self.results()
            .as_ref()
            .map(|results| results.borrow().clone())
            .unwrap_or_default()
    }

    /// Subscribes to result updates. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> ReactiveResult<watch::Receiver<QueryResults>> {
        self.results()
            .as_ref()
            .map(watch::Sender::subscribe)
            .ok_or_else(|| ReactiveError::Destroyed(format!("query {}", self.key)))
    }

    /// Pointer into the collection's change event buffer up to which the
    /// results are known to be current.
    pub fn latest_change_event(&self) -> u64 {
        self.latest_change_event.load(Ordering::Acquire)
    }

    pub fn set_latest_change_event(&self, pointer: u64) {
        self.latest_change_event.store(pointer, Ordering::Release);
    }

    pub fn is_released(&self) -> bool {
        self.results().is_none()
    }
}

impl CachedQuery for LiveQuery {
    fn cache_key(&self) -> &str {
        &self.key
    }

    fn subscriber_count(&self) -> usize {
        self.results()
            .as_ref()
            .map_or(0, watch::Sender::receiver_count)
    }

    fn release(&self) {
        self.results().take();
    }

    fn created_at(&self) -> u64 {
        self.created_at
    }
}

impl std::fmt::Debug for LiveQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveQuery")
            .field("key", &self.key)
            .field("index", &self.prepared.plan.index)
            .field("released", &self.is_released())
            .finish()
    }
}
