//! Cross-instance broadcast for docflow.
//!
//! Several processes (or, in tests, several database instances in one
//! process) share one storage. Each sends its change events through a named
//! broadcast channel and re-injects what siblings send. This crate provides:
//! - The [`BroadcastPrimitive`] / [`BroadcastPort`] capability the platform
//!   injects, and the [`InProcessBroadcast`] hub implementing it
//! - [`can_i_use`], the memoized capability probe
//! - [`BroadcastChannel`], which opens its port lazily, stamps every message
//!   with the sender's token and drops self-echoes from its inbound stream

mod channel;
mod error;
mod primitive;

pub use channel::{can_i_use, channel_name, BroadcastChannel, BroadcastMessage};
pub use error::{BroadcastError, BroadcastResult};
pub use primitive::{BroadcastPort, BroadcastPrimitive, InProcessBroadcast, DEFAULT_CAPACITY};
