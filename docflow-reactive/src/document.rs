//! Live document wrappers held by the document cache.

use docflow_types::{is_deleted, ChangeEvent, ChangeOp};
use serde_json::Value;
use tokio::sync::watch;

/// The single shared view of one document id.
///
/// Holds the latest known state, updated by the change events of the
/// owning collection. `None` means absent or deleted.
#[derive(Debug)]
pub struct LiveDocument {
    collection: String,
    id: String,
    state: watch::Sender<Option<Value>>,
}

impl LiveDocument {
    pub fn new(collection: impl Into<String>, id: impl Into<String>, data: Option<Value>) -> Self {
        let (state, _) = watch::channel(data);
        Self {
            collection: collection.into(),
            id: id.into(),
            state,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The latest known document state.
    pub fn data(&self) -> Option<Value> {
        self.state.borrow().clone()
    }

    pub fn is_deleted(&self) -> bool {
        self.state.borrow().is_none()
    }

    /// Watches the document state. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Value>> {
        self.state.subscribe()
    }

    pub(crate) fn apply(&self, event: &ChangeEvent) {
        match event.op() {
            ChangeOp::Remove => {
                self.state.send_replace(None);
            }
            ChangeOp::Insert | ChangeOp::Update | ChangeOp::Local => {
                let next = event.value().filter(|v| !is_deleted(v)).cloned();
                self.state.send_replace(next);
            }
            ChangeOp::CollectionCreated | ChangeOp::CollectionRemoved => {}
        }
    }
}
