//! Identity caches for docflow.
//!
//! An identity cache maps a string key to exactly one shared instance. Two
//! instances exist for every collection:
//!
//! - [`DocumentCache`] keyed by primary key, so every code path that refers
//!   to "the document with id X" shares one wrapper and equality-based
//!   change detection works.
//! - [`QueryCache`] keyed by the canonical string of a normalized query, so
//!   call sites asking for the same query share one live result set.
//!
//! There is no eviction policy. Caches are cleared as a whole when their
//! owner is torn down; callers that need bounded memory evict manually.

mod document;
mod error;
mod identity;
mod query;

pub use document::DocumentCache;
pub use error::{CacheError, CacheResult};
pub use identity::IdentityCache;
pub use query::{CachedQuery, QueryCache};
