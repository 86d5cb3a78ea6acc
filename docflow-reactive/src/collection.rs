//! Per-collection state: caches, event history and encryption.

use crate::buffer::ChangeEventBuffer;
use crate::capabilities::Capabilities;
use crate::config::DEDUP_WINDOW;
use crate::dedup::{revision_key, RecentKeys};
use crate::document::LiveDocument;
use crate::live_query::LiveQuery;
use crate::ReactiveResult;
use docflow_cache::{DocumentCache, QueryCache};
use docflow_crypto::FieldCrypter;
use docflow_query::{normalize_mango_query, prepare_query, MangoQuery};
use docflow_types::{ChangeEvent, CollectionSchema};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// A collection of an open database.
pub struct CollectionHandle {
    name: String,
    schema: CollectionSchema,
    capabilities: Capabilities,
    crypter: FieldCrypter,
    documents: Arc<DocumentCache<LiveDocument>>,
    queries: QueryCache<LiveQuery>,
    buffer: Mutex<ChangeEventBuffer>,
    revisions: Mutex<RecentKeys>,
}

impl CollectionHandle {
    pub(crate) fn new(
        name: &str,
        schema: CollectionSchema,
        capabilities: Capabilities,
        crypter: FieldCrypter,
        event_buffer_limit: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            schema,
            capabilities,
            crypter,
            documents: Arc::new(DocumentCache::new()),
            queries: QueryCache::new(),
            buffer: Mutex::new(ChangeEventBuffer::new(event_buffer_limit)),
            revisions: Mutex::new(RecentKeys::new(DEDUP_WINDOW)),
        }
    }

    fn buffer(&self) -> MutexGuard<'_, ChangeEventBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn revisions(&self) -> MutexGuard<'_, RecentKeys> {
        self.revisions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Returns the live query for `raw`.
    ///
    /// Queries that normalize to the same canonical form share one
    /// [`LiveQuery`].
    pub fn query(&self, raw: &MangoQuery) -> ReactiveResult<Arc<LiveQuery>> {
        let normalized = normalize_mango_query(&self.schema, raw);
        if let Some(cached) = self.queries.get(&normalized.canonical_string()) {
            return Ok(cached);
        }

        let planner = self.capabilities.planner()?;
        let prepared = prepare_query(&self.schema, normalized, &*planner)?;
        let query = LiveQuery::new(&self.schema, prepared)?;
        query.set_latest_change_event(self.event_counter());
        trace!("Created live query {:?} on {}", query, self.name);
        Ok(self.queries.get_by_query(query)?)
    }

    /// Evicts unsubscribed queries beyond the `keep` newest. Returns how many
    /// were evicted.
    pub fn clean_up_queries(&self, keep: usize) -> usize {
        self.queries.replace_unused(keep)
    }

    pub fn query_cache(&self) -> &QueryCache<LiveQuery> {
        &self.queries
    }

    /// The shared wrapper for document `id`, created on first access.
    pub fn document(&self, id: &str) -> Arc<LiveDocument> {
        self.documents
            .get_or_insert(id, || LiveDocument::new(self.name.as_str(), id, None))
    }

    pub fn document_cache(&self) -> Arc<DocumentCache<LiveDocument>> {
        Arc::clone(&self.documents)
    }

    pub fn crypter(&self) -> &FieldCrypter {
        &self.crypter
    }

    /// Encrypts `doc` for persistence.
    pub fn encrypt(&self, doc: &Value) -> ReactiveResult<Value> {
        Ok(self.crypter.encrypt(doc)?)
    }

    /// Decrypts a persisted `doc`.
    pub fn decrypt(&self, doc: &Value) -> ReactiveResult<Value> {
        Ok(self.crypter.decrypt(doc)?)
    }

    /// Sequence number of the newest recorded change event.
    pub fn event_counter(&self) -> u64 {
        self.buffer().counter()
    }

    /// Recorded events from `pointer` on, or `None` if some were evicted.
    pub fn events_since(&self, pointer: u64) -> Option<Vec<ChangeEvent>> {
        self.buffer().get_from(pointer)
    }

    /// Whether a change of document `id` to revision `rev` was already
    /// delivered on this collection.
    pub fn has_delivered(&self, id: &str, rev: &str) -> bool {
        self.revisions().contains(&revision_key(id, rev))
    }

    /// Records a document event. Returns false, recording nothing, when an
    /// event for the same document revision was recorded before.
    pub(crate) fn record(&self, event: &ChangeEvent) -> bool {
        let Some(doc_id) = event.doc_id() else {
            return true;
        };
        if let Some(rev) = event.revision() {
            if !self.revisions().insert(revision_key(doc_id, rev)) {
                return false;
            }
        }
        self.buffer().push(event.clone());
        if let Some(document) = self.documents.get(doc_id) {
            document.apply(event);
        }
        true
    }

    pub(crate) fn destroy(&self) {
        self.queries.destroy();
        self.documents.clear();
        debug!("Destroyed collection {}", self.name);
    }
}

impl std::fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("name", &self.name)
            .field("primary_key", &self.schema.primary_key)
            .field("documents", &self.documents.len())
            .field("queries", &self.queries.len())
            .finish()
    }
}
