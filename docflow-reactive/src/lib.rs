//! Reactive database hub for docflow.
//!
//! Wires the core crates into an open database instance:
//! - [`Capabilities`] injects the cipher, query planner and broadcast primitive
//! - [`DatabaseHandle`] delivers change events to local subscribers in order
//!   and fans them out to sibling instances over a broadcast channel
//! - [`CollectionHandle`] owns the document cache, the query cache and a
//!   [`ChangeEventBuffer`] of recent events
//! - [`LiveQuery`] is the one shared object per canonical query
//!
//! # Example
//!
//! ```no_run
//! use docflow_reactive::{Capabilities, DatabaseConfig, DatabaseHandle};
//! use docflow_broadcast::InProcessBroadcast;
//! use docflow_query::IndexQueryPlanner;
//! use std::sync::Arc;
//!
//! # async fn run() -> docflow_reactive::ReactiveResult<()> {
//! let capabilities = Capabilities::new()
//!     .with_planner(Arc::new(IndexQueryPlanner))
//!     .with_broadcast(Arc::new(InProcessBroadcast::new()));
//! let db = DatabaseHandle::open(DatabaseConfig::named("heroes"), capabilities).await?;
//! db.destroy();
//! # Ok(())
//! # }
//! ```

mod buffer;
mod capabilities;
mod collection;
mod config;
mod database;
mod dedup;
mod document;
mod error;
mod live_query;

pub use buffer::ChangeEventBuffer;
pub use capabilities::{Capabilities, BROADCAST_FEATURE, CIPHER_FEATURE, PLANNER_FEATURE};
pub use collection::CollectionHandle;
pub use config::{DatabaseConfig, DEDUP_WINDOW, DEFAULT_EVENT_BUFFER_LIMIT, HUB_CAPACITY};
pub use database::{DatabaseHandle, CHANGE_MESSAGE, SOCKET_CHANNEL};
pub use dedup::RecentKeys;
pub use document::LiveDocument;
pub use error::{ReactiveError, ReactiveResult};
pub use live_query::{LiveQuery, QueryResults};
