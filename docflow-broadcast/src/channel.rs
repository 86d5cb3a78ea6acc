use crate::primitive::{BroadcastPort, BroadcastPrimitive};
use crate::{BroadcastError, BroadcastResult};
use docflow_types::{now, DatabaseIdentity, InstanceToken};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

/// Wire form of one broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    #[serde(rename = "type")]
    pub kind: String,
    /// Token of the sending instance.
    pub it: InstanceToken,
    pub data: Value,
    pub t: u64,
}

static PROBES: OnceLock<Mutex<HashMap<String, bool>>> = OnceLock::new();

/// Whether `primitive` is usable on this platform.
///
/// The probe runs once per primitive kind; later calls return the cached
/// answer.
pub fn can_i_use(primitive: &dyn BroadcastPrimitive) -> bool {
    let mut probes = PROBES
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    *probes
        .entry(primitive.kind().to_string())
        .or_insert_with(|| primitive.is_supported())
}

/// Name shared by every instance of the same database.
#[must_use]
pub fn channel_name(database: &str, name: &str) -> String {
    format!("docflow:{database}:{name}")
}

/// Lazily opened wrapper around a primitive port.
///
/// The port is opened on the first `write` or `events` call. Messages carry
/// this instance's token, and [`BroadcastChannel::events`] drops messages
/// carrying it, so an instance never hears its own broadcasts.
pub struct BroadcastChannel {
    name: String,
    token: InstanceToken,
    primitive: Arc<dyn BroadcastPrimitive>,
    port: OnceLock<Box<dyn BroadcastPort>>,
    closed: AtomicBool,
    closed_tx: watch::Sender<bool>,
}

impl BroadcastChannel {
    /// Creates the channel `name` of `database`, or `None` when the primitive
    /// is not supported here.
    pub fn create(
        database: &DatabaseIdentity,
        name: &str,
        primitive: Arc<dyn BroadcastPrimitive>,
    ) -> Option<Self> {
        if !can_i_use(&*primitive) {
            debug!(
                "Broadcast primitive {} unsupported, no channel for {}",
                primitive.kind(),
                database.name()
            );
            return None;
        }
        Some(Self {
            name: channel_name(database.name(), name),
            token: database.token(),
            primitive,
            port: OnceLock::new(),
            closed: AtomicBool::new(false),
            closed_tx: watch::channel(false).0,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn token(&self) -> InstanceToken {
        self.token
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether the underlying port has been opened.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.port.get().is_some()
    }

    fn port(&self) -> BroadcastResult<&dyn BroadcastPort> {
        if self.is_closed() {
            return Err(BroadcastError::Closed(self.name.clone()));
        }
        if let Some(port) = self.port.get() {
            return Ok(&**port);
        }
        let opened = self.primitive.open(&self.name)?;
        if let Err(lost) = self.port.set(opened) {
            lost.close();
        } else {
            debug!("Opened broadcast channel {}", self.name);
        }
        self.port
            .get()
            .map(|port| &**port)
            .ok_or_else(|| BroadcastError::Primitive(format!("port for {} vanished", self.name)))
    }

    /// Sends `data` as a message of type `kind` to every other instance on
    /// this channel.
    pub async fn write(&self, kind: &str, data: Value) -> BroadcastResult<()> {
        let message = BroadcastMessage {
            kind: kind.to_string(),
            it: self.token,
            data,
            t: now(),
        };
        let encoded = serde_json::to_string(&message)?;
        self.port()?.post_message(encoded)?;
        trace!("Wrote {} message to {}", kind, self.name);
        Ok(())
    }

    /// Messages from other instances, in arrival order.
    ///
    /// Undecodable messages are yielded as [`BroadcastError::Decode`] and the
    /// stream continues. The stream ends when the channel is closed. Dropping
    /// it unsubscribes without closing the channel.
    pub fn events(
        &self,
    ) -> BroadcastResult<impl Stream<Item = BroadcastResult<BroadcastMessage>> + Send + use<>>
    {
        let receiver = self.port()?.subscribe();
        let closed = self.closed_tx.subscribe();
        let token = self.token;
        let name = self.name.clone();

        Ok(futures::stream::unfold(
            (receiver, closed),
            move |(mut receiver, mut closed)| {
                let name = name.clone();
                async move {
                    loop {
                        let received = tokio::select! {
                            biased;
                            _ = closed.wait_for(|closed| *closed) => return None,
                            received = receiver.recv() => received,
                        };
                        match received {
                            Ok(raw) => match serde_json::from_str::<BroadcastMessage>(&raw) {
                                Ok(message) if message.it == token => {
                                    trace!("Dropped self-echo {} on {}", message.kind, name);
                                }
                                Ok(message) => return Some((Ok(message), (receiver, closed))),
                                Err(e) => {
                                    warn!("Failed to decode message on {}: {}", name, e);
                                    let err = BroadcastError::Decode {
                                        channel: name,
                                        reason: e.to_string(),
                                    };
                                    return Some((Err(err), (receiver, closed)));
                                }
                            },
                            Err(RecvError::Lagged(skipped)) => {
                                warn!("Receiver on {} lagged, skipped {} messages", name, skipped);
                            }
                            Err(RecvError::Closed) => return None,
                        }
                    }
                }
            },
        ))
    }

    /// Closes the channel. Safe to call repeatedly and before first use.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.closed_tx.send_replace(true);
        if let Some(port) = self.port.get() {
            port.close();
            debug!("Closed broadcast channel {}", self.name);
        }
    }
}

impl Drop for BroadcastChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for BroadcastChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastChannel")
            .field("name", &self.name)
            .field("token", &self.token)
            .field("open", &self.is_open())
            .field("closed", &self.is_closed())
            .finish()
    }
}
