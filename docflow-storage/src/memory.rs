//! In-memory storage engine.

use crate::engine::{AllDocsOptions, AllDocsRow, StorageEngine, ID_FIELD};
use crate::error::{StorageError, StorageResult};
use docflow_types::{RawChange, ATTACHMENTS_FIELD, DELETED_FIELD, REVISION_FIELD};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, trace};

const DEFAULT_FEED_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    height: u64,
    rev: String,
    deleted: bool,
    doc: Value,
}

/// A revisioned document store held in memory.
///
/// Deleted documents keep their entry as a tombstone, so a re-created id
/// continues from the tombstone's height.
pub struct MemoryStorage {
    docs: Mutex<BTreeMap<String, Entry>>,
    feed: broadcast::Sender<RawChange>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Creates an engine whose change feed buffers `capacity` changes per
    /// subscriber.
    pub fn with_feed_capacity(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity.max(1));
        Self {
            docs: Mutex::new(BTreeMap::new()),
            feed,
        }
    }

    fn docs(&self) -> MutexGuard<'_, BTreeMap<String, Entry>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.docs().values().filter(|e| !e.deleted).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("documents", &self.docs().len())
            .finish()
    }
}

fn revision(id: &str, height: u64, body: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(height.to_be_bytes());
    hasher.update(body.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", height, &digest[..32])
}

fn prepare(doc: Value) -> StorageResult<(String, Option<String>, Map<String, Value>)> {
    let mut body = match doc {
        Value::Object(body) => body,
        other => {
            return Err(StorageError::InvalidData(format!(
                "document must be an object, got {}",
                other
            )));
        }
    };
    let id = match body.get(ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        other => {
            return Err(StorageError::InvalidData(format!(
                "document needs a non-empty string {}, got {:?}",
                ID_FIELD, other
            )));
        }
    };
    let expected = match body.remove(REVISION_FIELD) {
        None | Some(Value::Null) => None,
        Some(Value::String(rev)) => Some(rev),
        Some(other) => {
            return Err(StorageError::InvalidData(format!(
                "{} of {} must be a string, got {}",
                REVISION_FIELD, id, other
            )));
        }
    };
    Ok((id, expected, body))
}

fn visible(doc: &Value, attachments: bool) -> Value {
    let mut doc = doc.clone();
    if !attachments {
        if let Value::Object(map) = &mut doc {
            map.remove(ATTACHMENTS_FIELD);
        }
    }
    doc
}

impl StorageEngine for MemoryStorage {
    fn all_docs(&self, options: AllDocsOptions) -> StorageResult<Vec<AllDocsRow>> {
        let docs = self.docs();
        let rows = docs
            .iter()
            .filter(|(_, entry)| !entry.deleted)
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|(id, entry)| AllDocsRow {
                id: id.clone(),
                rev: entry.rev.clone(),
                doc: options
                    .include_docs
                    .then(|| visible(&entry.doc, options.attachments)),
            })
            .collect();
        Ok(rows)
    }

    fn get(&self, id: &str) -> StorageResult<Value> {
        match self.docs().get(id) {
            Some(entry) if !entry.deleted => Ok(entry.doc.clone()),
            _ => Err(StorageError::NotFound(id.to_string())),
        }
    }

    fn bulk_write(&self, docs: Vec<Value>) -> StorageResult<Vec<RawChange>> {
        let mut store = self.docs();
        let mut staged: HashMap<String, Entry> = HashMap::new();
        let mut changes = Vec::with_capacity(docs.len());

        for doc in docs {
            let (id, expected, mut body) = prepare(doc)?;
            let current = staged.get(&id).or_else(|| store.get(&id));
            let actual = current.filter(|e| !e.deleted).map(|e| e.rev.clone());
            if expected != actual {
                return Err(StorageError::Conflict {
                    id,
                    expected,
                    actual,
                });
            }

            let height = current.map_or(0, |e| e.height) + 1;
            let deleted = body.get(DELETED_FIELD).and_then(Value::as_bool) == Some(true);
            if deleted {
                body = Map::from_iter([
                    (ID_FIELD.to_string(), Value::String(id.clone())),
                    (DELETED_FIELD.to_string(), Value::Bool(true)),
                ]);
            }
            let rev = revision(&id, height, &Value::Object(body.clone()));
            body.insert(REVISION_FIELD.to_string(), Value::String(rev.clone()));
            let doc = Value::Object(body);

            changes.push(RawChange {
                id: id.clone(),
                rev: rev.clone(),
                deleted,
                doc: Some(doc.clone()),
            });
            staged.insert(
                id,
                Entry {
                    height,
                    rev,
                    deleted,
                    doc,
                },
            );
        }

        store.extend(staged);
        drop(store);

        for change in &changes {
            trace!("Stored {} at {}", change.id, change.rev);
            // No subscribers is not an error.
            let _ = self.feed.send(change.clone());
        }
        debug!("Wrote {} documents", changes.len());
        Ok(changes)
    }

    fn changes(&self) -> broadcast::Receiver<RawChange> {
        self.feed.subscribe()
    }
}
