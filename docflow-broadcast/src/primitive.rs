//! Platform broadcast primitives.
//!
//! A primitive is a publish/subscribe channel keyed by name, visible to every
//! instance that opens the same name. [`InProcessBroadcast`] implements it with
//! `tokio::sync::broadcast`, so several database instances in one process can
//! stand in for sibling processes.

use crate::{BroadcastError, BroadcastResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;

/// Default per-channel message buffer of [`InProcessBroadcast`].
pub const DEFAULT_CAPACITY: usize = 256;

/// An opened channel.
pub trait BroadcastPort: Send + Sync {
    /// Posts a message to every subscriber of the channel, the poster's own
    /// subscriptions included.
    fn post_message(&self, message: String) -> BroadcastResult<()>;

    /// Subscribes to messages posted from now on.
    fn subscribe(&self) -> broadcast::Receiver<String>;

    /// Releases the port. Further posts fail.
    fn close(&self);
}

/// A platform capability that opens named channels.
pub trait BroadcastPrimitive: Send + Sync {
    /// Stable name of the primitive kind, used to memoize the capability probe.
    fn kind(&self) -> &str;

    /// Whether the platform supports this primitive at all.
    fn is_supported(&self) -> bool;

    fn open(&self, name: &str) -> BroadcastResult<Box<dyn BroadcastPort>>;
}

struct Slot {
    sender: broadcast::Sender<String>,
    open_ports: usize,
}

type Channels = Arc<Mutex<HashMap<String, Slot>>>;

fn lock(channels: &Channels) -> MutexGuard<'_, HashMap<String, Slot>> {
    channels.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process hub: one `tokio::sync::broadcast` sender per channel name.
///
/// A name is forgotten once its last port is closed or dropped.
#[derive(Clone)]
pub struct InProcessBroadcast {
    channels: Channels,
    capacity: usize,
}

impl InProcessBroadcast {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a hub whose channels buffer up to `capacity` messages per
    /// receiver before slow receivers start lagging.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Number of channel names with at least one open port.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        lock(&self.channels).len()
    }
}

impl Default for InProcessBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InProcessBroadcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessBroadcast")
            .field("channels", &self.channel_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl BroadcastPrimitive for InProcessBroadcast {
    fn kind(&self) -> &str {
        "in-process"
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn open(&self, name: &str) -> BroadcastResult<Box<dyn BroadcastPort>> {
        let sender = {
            let mut channels = lock(&self.channels);
            let slot = channels.entry(name.to_string()).or_insert_with(|| Slot {
                sender: broadcast::channel(self.capacity).0,
                open_ports: 0,
            });
            slot.open_ports += 1;
            slot.sender.clone()
        };
        debug!("Opened in-process port on {}", name);
        Ok(Box::new(InProcessPort {
            name: name.to_string(),
            sender,
            channels: Arc::clone(&self.channels),
            closed: AtomicBool::new(false),
        }))
    }
}

struct InProcessPort {
    name: String,
    sender: broadcast::Sender<String>,
    channels: Channels,
    closed: AtomicBool,
}

impl InProcessPort {
    fn release(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut channels = lock(&self.channels);
        if let Some(slot) = channels.get_mut(&self.name) {
            slot.open_ports = slot.open_ports.saturating_sub(1);
            if slot.open_ports == 0 {
                channels.remove(&self.name);
                debug!("Forgot in-process channel {}", self.name);
            }
        }
    }
}

impl Drop for InProcessPort {
    fn drop(&mut self) {
        self.release();
    }
}

impl BroadcastPort for InProcessPort {
    fn post_message(&self, message: String) -> BroadcastResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BroadcastError::Closed(self.name.clone()));
        }
        // No receivers only means nobody is listening yet.
        let _ = self.sender.send(message);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    fn close(&self) {
        self.release();
    }
}
