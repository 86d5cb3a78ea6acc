//! Error types for the reactive hub.

use thiserror::Error;

/// Result type for reactive hub operations.
pub type ReactiveResult<T> = Result<T, ReactiveError>;

/// Errors that can occur while opening, using or tearing down a database.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// An operation needs a capability that was not injected.
    #[error("feature not configured: {feature}")]
    FeatureNotConfigured { feature: &'static str },

    /// The database was destroyed.
    #[error("database {0} is destroyed")]
    Destroyed(String),

    /// The named collection does not exist on this database.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error(transparent)]
    Types(#[from] docflow_types::Error),

    #[error(transparent)]
    Query(#[from] docflow_query::QueryError),

    #[error(transparent)]
    Cache(#[from] docflow_cache::CacheError),

    #[error(transparent)]
    Broadcast(#[from] docflow_broadcast::BroadcastError),

    #[error(transparent)]
    Crypto(#[from] docflow_crypto::CryptoError),

    #[error(transparent)]
    Storage(#[from] docflow_storage::StorageError),
}
