//! Error types for the cache layer.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache was destroyed together with its owner.
    #[error("cache already destroyed, cannot insert {key:?}")]
    Destroyed { key: String },
}
