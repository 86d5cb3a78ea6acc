//! Core type definitions for docflow.
//!
//! This crate defines the types every other docflow crate builds on:
//! - Instance tokens and database identities
//! - The process-monotonic millisecond clock
//! - Dot-path helpers over JSON documents
//! - Change events and raw storage change records
//! - The collection schema contract consumed by queries and encryption
//!
//! Nothing here performs I/O. Storage engines, broadcast primitives and
//! ciphers are collaborators that live in their own crates.

mod document;
mod event;
mod ids;
mod schema;
mod timestamp;

pub use document::{
    get_path, is_deleted, remove_path, set_path, Document, ATTACHMENTS_FIELD, DELETED_FIELD,
    REVISION_FIELD,
};
pub use event::{
    revision_height, ChangeEvent, ChangeEventData, ChangeOp, RawChange, CONTROL_COLLECTION,
    INTERNAL_PREFIX, REMOTE_DB,
};
pub use ids::{validate_collection_name, DatabaseIdentity, InstanceToken};
pub use schema::{CollectionSchema, FieldType, SchemaField};
pub use timestamp::now;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    /// A serialized change event could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A revision string was not of the form `<height>-<hash>`.
    #[error("invalid revision: {0:?}")]
    InvalidRevision(String),

    /// Collection and database names must match `[a-z][a-z0-9_$-]*`.
    #[error("invalid collection name: {0:?}")]
    InvalidCollectionName(String),
}
