//! Open databases and their event hub.

use crate::capabilities::Capabilities;
use crate::collection::CollectionHandle;
use crate::config::{DatabaseConfig, DEDUP_WINDOW};
use crate::dedup::RecentKeys;
use crate::document::LiveDocument;
use crate::{ReactiveError, ReactiveResult};
use docflow_broadcast::{BroadcastChannel, BroadcastMessage, BroadcastResult};
use docflow_cache::{DocumentCache, IdentityCache};
use docflow_crypto::{check_password, password_hash, validate_password, FieldCrypter};
use docflow_storage::StorageEngine;
use serde_json::Value;
use docflow_types::{
    validate_collection_name, ChangeEvent, ChangeOp, CollectionSchema, DatabaseIdentity,
    InstanceToken, RawChange,
};
use futures::{Stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Name of the broadcast channel change events travel on.
pub const SOCKET_CHANNEL: &str = "socket";

/// Message type of a serialized change event on the socket channel.
pub const CHANGE_MESSAGE: &str = "change";

struct DatabaseInner {
    identity: DatabaseIdentity,
    config: DatabaseConfig,
    capabilities: Capabilities,
    hub: Mutex<Option<broadcast::Sender<ChangeEvent>>>,
    socket: Option<BroadcastChannel>,
    collections: IdentityCache<CollectionHandle>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl DatabaseInner {
    fn hub(&self) -> MutexGuard<'_, Option<broadcast::Sender<ChangeEvent>>> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands `event` to the owning collection and every local subscriber.
    ///
    /// A document event whose revision was already delivered is dropped.
    /// Returns whether the event was delivered.
    fn deliver(&self, event: ChangeEvent) -> bool {
        if let Some(collection) = event.collection().and_then(|name| self.collections.get(name)) {
            if !collection.record(&event) {
                trace!("Dropped duplicate {} on {}", event, self.identity.name());
                return false;
            }
        }
        if let Some(hub) = self.hub().as_ref() {
            // No subscribers is not an error.
            let _ = hub.send(event);
        }
        true
    }
}

/// Handle to an open database instance.
///
/// Clones share the instance. Events emitted on it reach every local
/// subscriber in emission order and, when multi-instance is on, every sibling
/// instance of the same database name.
#[derive(Clone)]
pub struct DatabaseHandle {
    inner: Arc<DatabaseInner>,
}

impl DatabaseHandle {
    /// Opens a database instance with a fresh instance token.
    ///
    /// With a password the cipher capability is required. With
    /// multi-instance the broadcast capability is required; a primitive that
    /// is not supported on this platform leaves the instance single.
    pub async fn open(config: DatabaseConfig, capabilities: Capabilities) -> ReactiveResult<Self> {
        let identity = DatabaseIdentity::new(config.name.as_str())?;
        if let Some(password) = &config.password {
            validate_password(password)?;
            capabilities.cipher()?;
        }

        let socket = if config.multi_instance {
            BroadcastChannel::create(&identity, SOCKET_CHANNEL, capabilities.broadcast()?)
        } else {
            None
        };
        let inbound = socket.as_ref().map(BroadcastChannel::events).transpose()?;

        let (hub, _) = broadcast::channel(config.hub_capacity.max(1));
        let inner = Arc::new(DatabaseInner {
            identity,
            config,
            capabilities,
            hub: Mutex::new(Some(hub)),
            socket,
            collections: IdentityCache::new(),
            tasks: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        });

        if let Some(inbound) = inbound {
            let pump = tokio::spawn(run_inbound_pump(Arc::downgrade(&inner), inbound));
            inner
                .tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(pump);
        }

        info!(
            "Opened database {} as instance {} (multi-instance: {})",
            inner.identity.name(),
            inner.identity.token(),
            inner.socket.is_some()
        );
        Ok(Self { inner })
    }

    pub fn name(&self) -> &str {
        self.inner.identity.name()
    }

    pub fn token(&self) -> InstanceToken {
        self.inner.identity.token()
    }

    pub fn identity(&self) -> &DatabaseIdentity {
        &self.inner.identity
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.inner.config
    }

    /// Whether events are fanned out to sibling instances.
    pub fn is_multi_instance(&self) -> bool {
        self.inner.socket.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> ReactiveResult<()> {
        if self.is_destroyed() {
            return Err(ReactiveError::Destroyed(self.name().to_string()));
        }
        Ok(())
    }

    /// Hash of the configured password, stored next to encrypted data.
    pub fn password_hash(&self) -> Option<String> {
        self.inner.config.password.as_deref().map(password_hash)
    }

    /// Fails unless this instance was opened with the password that produced
    /// `stored_hash`.
    pub fn verify_password(&self, stored_hash: &str) -> ReactiveResult<()> {
        let password = self.inner.config.password.as_deref().unwrap_or_default();
        Ok(check_password(password, stored_hash)?)
    }

    /// Creates collection `name`, or returns the existing one.
    pub async fn create_collection(
        &self,
        name: &str,
        schema: CollectionSchema,
    ) -> ReactiveResult<Arc<CollectionHandle>> {
        self.ensure_open()?;
        validate_collection_name(name, false)?;
        if let Some(existing) = self.inner.collections.get(name) {
            return Ok(existing);
        }

        let cipher = self.inner.capabilities.cipher().ok();
        let crypter = FieldCrypter::new(&schema, self.inner.config.password.clone(), cipher)?;
        let candidate = Arc::new(CollectionHandle::new(
            name,
            schema,
            self.inner.capabilities.clone(),
            crypter,
            self.inner.config.event_buffer_limit,
        ));
        let collection = self
            .inner
            .collections
            .insert_if_absent(name, Arc::clone(&candidate));

        if Arc::ptr_eq(&collection, &candidate) {
            debug!("Created collection {} on {}", name, self.name());
            let event = ChangeEvent::from_write(
                ChangeOp::CollectionCreated,
                &self.inner.identity,
                Some(name),
                None,
                None,
                false,
            );
            self.emit(event).await?;
        }
        Ok(collection)
    }

    pub fn collection(&self, name: &str) -> ReactiveResult<Arc<CollectionHandle>> {
        self.inner
            .collections
            .get(name)
            .ok_or_else(|| ReactiveError::UnknownCollection(name.to_string()))
    }

    /// Names of the open collections.
    pub fn collection_names(&self) -> Vec<String> {
        self.inner.collections.keys()
    }

    /// The shared document cache of `collection`.
    pub fn document_cache(
        &self,
        collection: &str,
    ) -> ReactiveResult<Arc<DocumentCache<LiveDocument>>> {
        Ok(self.collection(collection)?.document_cache())
    }

    /// Delivers `event` locally, then sends it to sibling instances if this
    /// instance produced it and it is not internal.
    ///
    /// Document events carrying a `_rev` reach local subscribers once per
    /// revision, however often and by whichever path they arrive. The event
    /// is still sent to siblings when it was a local duplicate; they
    /// deduplicate the same way.
    pub async fn emit(&self, event: ChangeEvent) -> ReactiveResult<()> {
        self.ensure_open()?;
        let outbound = (!event.is_remote()
            && event.token() == self.token()
            && !event.is_internal())
        .then(|| event.to_serializable());

        self.inner.deliver(event);

        if let (Some(socket), Some(data)) = (&self.inner.socket, outbound) {
            socket.write(CHANGE_MESSAGE, data).await?;
        }
        Ok(())
    }

    /// Every event delivered on this instance from now on, local and remote.
    /// The stream ends when the database is destroyed.
    ///
    /// A subscriber that falls more than
    /// [`hub_capacity`](DatabaseConfig::hub_capacity) events behind skips the
    /// oldest ones with a warning and continues with the retained events.
    /// Consumers that must not miss document changes catch up through
    /// [`CollectionHandle::events_since`].
    pub fn changes(&self) -> ReactiveResult<impl Stream<Item = ChangeEvent> + Send + use<>> {
        let receiver = self
            .inner
            .hub()
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or_else(|| ReactiveError::Destroyed(self.name().to_string()))?;
        let name = self.name().to_string();

        Ok(futures::stream::unfold(receiver, move |mut receiver| {
            let name = name.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) => return Some((event, receiver)),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Subscriber on {} lagged, skipped {} events", name, skipped);
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        }))
    }

    /// Events about document `id` of `collection`.
    pub fn observe_document(
        &self,
        collection: &str,
        id: &str,
    ) -> ReactiveResult<impl Stream<Item = ChangeEvent> + Send + use<>> {
        let collection = collection.to_string();
        let id = id.to_string();
        Ok(self.changes()?.filter(move |event| {
            let relevant =
                event.collection() == Some(collection.as_str()) && event.doc_id() == Some(id.as_str());
            futures::future::ready(relevant)
        }))
    }

    /// Encrypts and writes `docs` to `engine`, then emits one event per
    /// stored change.
    ///
    /// The events carry the new revisions, so the same changes arriving
    /// through [`Self::watch_storage`] are not delivered again.
    pub async fn write_documents(
        &self,
        collection: &str,
        engine: &dyn StorageEngine,
        docs: Vec<Value>,
    ) -> ReactiveResult<Vec<ChangeEvent>> {
        self.ensure_open()?;
        let collection = self.collection(collection)?;
        let encrypted = docs
            .iter()
            .map(|doc| collection.encrypt(doc))
            .collect::<ReactiveResult<Vec<_>>>()?;

        let mut events = Vec::new();
        for mut change in engine.bulk_write(encrypted)? {
            if !change.deleted {
                if let Some(doc) = &change.doc {
                    change.doc = Some(collection.decrypt(doc)?);
                }
            }
            let event =
                ChangeEvent::from_storage_change(&change, self.identity(), collection.name())?;
            self.emit(event.clone()).await?;
            events.push(event);
        }
        debug!("Wrote {} documents to {}", events.len(), collection.name());
        Ok(events)
    }

    /// Delivers the change feed of `engine` as events of `collection`.
    ///
    /// Feed events stay on this instance: siblings sharing the storage read
    /// the same feed. Changes already delivered, for example by
    /// [`Self::write_documents`] or a sibling's broadcast, are skipped.
    ///
    /// Stored documents are decrypted before they become event values. The
    /// watcher stops when the feed closes or the database is destroyed.
    pub fn watch_storage(
        &self,
        collection: &str,
        engine: &dyn StorageEngine,
    ) -> ReactiveResult<()> {
        self.ensure_open()?;
        let collection = self.collection(collection)?;
        let feed = engine.changes();
        let task = tokio::spawn(run_storage_watcher(
            Arc::downgrade(&self.inner),
            collection,
            feed,
        ));
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
        Ok(())
    }

    /// Tears the instance down: closes the broadcast channel, stops
    /// background tasks, destroys query caches and clears document caches.
    ///
    /// Returns `false` if it was already destroyed.
    pub fn destroy(&self) -> bool {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(socket) = &self.inner.socket {
            socket.close();
        }
        let tasks: Vec<JoinHandle<()>> = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            task.abort();
        }
        for collection in self.inner.collections.clear() {
            collection.destroy();
        }
        self.inner.hub().take();
        info!("Destroyed database {}", self.name());
        true
    }
}

impl std::fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("identity", &self.inner.identity)
            .field("multi_instance", &self.is_multi_instance())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

async fn run_inbound_pump(
    inner: Weak<DatabaseInner>,
    inbound: impl Stream<Item = BroadcastResult<BroadcastMessage>>,
) {
    let mut inbound = Box::pin(inbound);
    let mut received_hashes = RecentKeys::new(DEDUP_WINDOW);
    while let Some(received) = inbound.next().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match received {
            Ok(message) if message.kind == CHANGE_MESSAGE => {
                match ChangeEvent::from_serialized(&message.data) {
                    Ok(event) if !received_hashes.insert(event.hash().to_string()) => {
                        trace!("Dropped repeated change event {} from {}", event, message.it);
                    }
                    Ok(event) => {
                        inner.deliver(event.into_remote());
                    }
                    Err(e) => warn!("Dropped undecodable change event from {}: {}", message.it, e),
                }
            }
            Ok(message) => debug!("Ignored {} message on the socket channel", message.kind),
            Err(e) => warn!("Inbound socket error: {}", e),
        }
    }
    debug!("Inbound pump stopped");
}

async fn run_storage_watcher(
    inner: Weak<DatabaseInner>,
    collection: Arc<CollectionHandle>,
    mut feed: broadcast::Receiver<RawChange>,
) {
    loop {
        let mut change = match feed.recv().await {
            Ok(change) => change,
            Err(RecvError::Lagged(skipped)) => {
                warn!(
                    "Storage watcher on {} lagged, skipped {} changes",
                    collection.name(),
                    skipped
                );
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if inner.destroyed.load(Ordering::Acquire) {
            break;
        }
        if collection.has_delivered(&change.id, &change.rev) {
            trace!("Skipped delivered change {} of {}", change.rev, change.id);
            continue;
        }

        if !change.deleted {
            if let Some(doc) = &change.doc {
                match collection.decrypt(doc) {
                    Ok(decrypted) => change.doc = Some(decrypted),
                    Err(e) => {
                        warn!("Skipped change {} of {}: {}", change.rev, change.id, e);
                        continue;
                    }
                }
            }
        }

        let event = match ChangeEvent::from_storage_change(
            &change,
            &inner.identity,
            collection.name(),
        ) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipped change {} of {}: {}", change.rev, change.id, e);
                continue;
            }
        };
        inner.deliver(event);
    }
    debug!("Storage watcher on {} stopped", collection.name());
}
