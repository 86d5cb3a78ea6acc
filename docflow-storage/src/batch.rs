//! Batch reads over a storage engine.

use crate::engine::{AllDocsOptions, StorageEngine, DESIGN_PREFIX};
use crate::error::{StorageError, StorageResult};
use serde_json::Value;
use tracing::debug;

/// Reads up to `limit` documents, skipping engine metadata.
///
/// Metadata rows count towards the limit, so a batch can come back shorter
/// than `limit` while more documents remain.
pub fn get_batch(engine: &dyn StorageEngine, limit: usize) -> StorageResult<Vec<Value>> {
    if limit <= 1 {
        return Err(StorageError::InvalidBatchSize { limit });
    }

    let rows = engine.all_docs(AllDocsOptions::default().with_limit(limit).with_docs())?;
    let docs: Vec<Value> = rows
        .into_iter()
        .filter(|row| !row.id.starts_with(DESIGN_PREFIX))
        .filter_map(|row| row.doc)
        .collect();
    debug!("Read batch of {} documents (limit {})", docs.len(), limit);
    Ok(docs)
}

/// Counts live documents, skipping engine metadata.
pub fn count_all_undeleted(engine: &dyn StorageEngine) -> StorageResult<usize> {
    let rows = engine.all_docs(AllDocsOptions::default())?;
    Ok(rows
        .iter()
        .filter(|row| !row.id.starts_with(DESIGN_PREFIX))
        .count())
}
