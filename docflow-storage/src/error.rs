//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Document not found.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A write named a revision that is not the document's current one.
    #[error("conflict on {id}: expected revision {expected:?}, found {actual:?}")]
    Conflict {
        id: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    /// Batch reads need room for more than one document.
    #[error("batch size must be larger than 1, got {limit}")]
    InvalidBatchSize { limit: usize },
}
