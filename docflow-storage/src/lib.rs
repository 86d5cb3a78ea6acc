//! Storage layer for docflow.
//!
//! The query and reactivity core never persists data itself. It talks to a
//! storage engine through the [`StorageEngine`] contract.
//!
//! # Architecture
//!
//! - Documents are JSON objects keyed by `_id` with `"<height>-<hash>"` revisions
//! - Every write is published as a [`RawChange`](docflow_types::RawChange) on the change feed
//! - Revision heights never repeat for an id, so changes can be classified from them
//! - [`MemoryStorage`] implements the contract in memory

mod batch;
mod engine;
mod error;
mod memory;

pub use batch::{count_all_undeleted, get_batch};
pub use engine::{AllDocsOptions, AllDocsRow, StorageEngine, DESIGN_PREFIX, ID_FIELD};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
