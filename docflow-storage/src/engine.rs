//! The storage engine contract.

use crate::error::StorageResult;
use docflow_types::RawChange;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Field holding a stored document's id.
pub const ID_FIELD: &str = "_id";

/// Ids with this prefix hold engine metadata rather than documents.
pub const DESIGN_PREFIX: &str = "_design";

/// Options for [`StorageEngine::all_docs`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AllDocsOptions {
    /// Maximum number of rows. `None` returns everything.
    pub limit: Option<usize>,
    /// Attach the document body to each row.
    pub include_docs: bool,
    /// Keep `_attachments` in returned bodies.
    pub attachments: bool,
}

impl AllDocsOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_docs(mut self) -> Self {
        self.include_docs = true;
        self
    }

    pub fn with_attachments(mut self) -> Self {
        self.attachments = true;
        self
    }
}

/// One row of an [`StorageEngine::all_docs`] listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    pub rev: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
}

/// A revisioned document store.
///
/// Documents are JSON objects keyed by [`ID_FIELD`]. Every successful write
/// assigns a `"<height>-<hash>"` revision whose height is strictly greater
/// than any earlier revision of the same id, deletions included, and
/// publishes a [`RawChange`] on the change feed.
pub trait StorageEngine: Send + Sync {
    /// Lists live documents ordered by id.
    fn all_docs(&self, options: AllDocsOptions) -> StorageResult<Vec<AllDocsRow>>;

    /// Fetches a live document. Deleted and unknown ids are
    /// [`StorageError::NotFound`](crate::StorageError::NotFound).
    fn get(&self, id: &str) -> StorageResult<Value>;

    /// Writes a batch of documents.
    ///
    /// A document that carries `_rev` must name the current revision of a
    /// live document; one without `_rev` must not collide with a live
    /// document. `_deleted: true` deletes. The batch is applied completely
    /// or not at all.
    fn bulk_write(&self, docs: Vec<Value>) -> StorageResult<Vec<RawChange>>;

    /// Subscribes to the change feed. Only changes made after the call are
    /// received.
    fn changes(&self) -> broadcast::Receiver<RawChange>;
}
