//! Change events.
//!
//! A [`ChangeEvent`] is the canonical record of a single mutation. It is
//! built either from an application-level write or from a raw storage change
//! record, delivered to local observers, and serialized onto the broadcast
//! channel so sibling instances can reconstruct an identical event.

use crate::{now, DatabaseIdentity, Error, InstanceToken, Result, REVISION_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;

/// `db` value of events that were received from a sibling instance.
pub const REMOTE_DB: &str = "remote";

/// Collections whose name starts with this prefix hold framework
/// bookkeeping, not user data.
pub const INTERNAL_PREFIX: &str = "_";

/// Collection used for coordination signals between instances.
pub const CONTROL_COLLECTION: &str = "_socket";

const HASH_SALT: &str = "docflow-change-event";

/// The kind of mutation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Remove,
    /// A collection was created on the database.
    CollectionCreated,
    /// A collection and all of its documents were removed.
    CollectionRemoved,
    /// A write to a local (non-replicated) document.
    Local,
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Remove => "REMOVE",
            Self::CollectionCreated => "COLLECTION_CREATED",
            Self::CollectionRemoved => "COLLECTION_REMOVED",
            Self::Local => "LOCAL",
        };
        f.write_str(name)
    }
}

/// The data of a change event, in its wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEventData {
    pub op: ChangeOp,
    /// Milliseconds since the unix epoch at creation time.
    pub t: u64,
    /// Origin database name, or [`REMOTE_DB`].
    pub db: String,
    /// Token of the instance that produced the event.
    pub it: InstanceToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Full post-mutation document state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<Value>,
    #[serde(rename = "isLocal", default)]
    pub is_local: bool,
}

/// A raw change record as emitted by a storage engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChange {
    /// Primary key of the changed document.
    pub id: String,
    /// Revision after the change, `"<height>-<hash>"`.
    pub rev: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
}

/// An immutable change event with a lazily computed content hash.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    data: ChangeEventData,
    hash: OnceLock<String>,
}

impl ChangeEvent {
    /// Wraps already-built event data.
    #[must_use]
    pub fn new(data: ChangeEventData) -> Self {
        Self {
            data,
            hash: OnceLock::new(),
        }
    }

    /// Builds an event from an application-level write.
    #[must_use]
    pub fn from_write(
        op: ChangeOp,
        database: &DatabaseIdentity,
        collection: Option<&str>,
        doc_id: Option<&str>,
        value: Option<Value>,
        is_local: bool,
    ) -> Self {
        Self::new(ChangeEventData {
            op,
            t: now(),
            db: database.name().to_string(),
            it: database.token(),
            col: collection.map(str::to_string),
            doc: doc_id.map(str::to_string),
            v: value,
            is_local,
        })
    }

    /// Builds an event from a storage engine's change record.
    ///
    /// A first revision is an insert, unless the record is already flagged
    /// deleted. A deletion flag on any revision is a remove; everything else
    /// is an update. This relies on the storage engine never reusing a
    /// revision height for the same id, including after deletion.
    pub fn from_storage_change(
        change: &RawChange,
        database: &DatabaseIdentity,
        collection: &str,
    ) -> Result<Self> {
        let op = if change.deleted {
            ChangeOp::Remove
        } else if revision_height(&change.rev)? == 1 {
            ChangeOp::Insert
        } else {
            ChangeOp::Update
        };

        Ok(Self::new(ChangeEventData {
            op,
            t: now(),
            db: database.name().to_string(),
            it: database.token(),
            col: Some(collection.to_string()),
            doc: Some(change.id.clone()),
            v: change.doc.clone(),
            is_local: false,
        }))
    }

    /// Reconstructs an event from the output of [`Self::to_serializable`].
    pub fn from_serialized(value: &Value) -> Result<Self> {
        let data = ChangeEventData::deserialize(value).map_err(|e| Error::Decode(e.to_string()))?;
        Ok(Self::new(data))
    }

    /// Reconstructs an event from its JSON string form.
    pub fn from_json(json: &str) -> Result<Self> {
        let data: ChangeEventData =
            serde_json::from_str(json).map_err(|e| Error::Decode(e.to_string()))?;
        Ok(Self::new(data))
    }

    /// Projects the event to its wire form. Absent optional fields are left
    /// out.
    #[must_use]
    pub fn to_serializable(&self) -> Value {
        // ChangeEventData has only string-keyed fields and JSON values, which
        // serde_json always serializes.
        serde_json::to_value(&self.data).unwrap_or(Value::Null)
    }

    /// Marks the event as received from a sibling instance.
    #[must_use]
    pub fn into_remote(self) -> Self {
        let mut data = self.data;
        data.db = REMOTE_DB.to_string();
        Self::new(data)
    }

    /// The event data.
    #[must_use]
    pub fn data(&self) -> &ChangeEventData {
        &self.data
    }

    #[must_use]
    pub fn op(&self) -> ChangeOp {
        self.data.op
    }

    #[must_use]
    pub fn token(&self) -> InstanceToken {
        self.data.it
    }

    #[must_use]
    pub fn collection(&self) -> Option<&str> {
        self.data.col.as_deref()
    }

    #[must_use]
    pub fn doc_id(&self) -> Option<&str> {
        self.data.doc.as_deref()
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.data.v.as_ref()
    }

    /// Storage revision of the document state the event carries.
    #[must_use]
    pub fn revision(&self) -> Option<&str> {
        self.data
            .v
            .as_ref()
            .and_then(|v| v.get(REVISION_FIELD))
            .and_then(Value::as_str)
    }

    /// True if the event was received from another instance.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.data.db == REMOTE_DB
    }

    /// True for framework bookkeeping events.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.data
            .col
            .as_deref()
            .is_some_and(|col| col.starts_with(INTERNAL_PREFIX))
    }

    /// True for coordination events on the control collection.
    #[must_use]
    pub fn is_control_event(&self) -> bool {
        self.data.col.as_deref() == Some(CONTROL_COLLECTION)
    }

    /// Content hash of the event data, computed once.
    pub fn hash(&self) -> &str {
        self.hash.get_or_init(|| {
            // Infallible for the same reason as `to_serializable`.
            let json = serde_json::to_string(&self.data).unwrap_or_default();
            let mut hasher = Sha256::new();
            hasher.update(HASH_SALT.as_bytes());
            hasher.update(json.as_bytes());
            hex::encode(hasher.finalize())
        })
    }
}

impl PartialEq for ChangeEvent {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Serialize for ChangeEvent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChangeEvent {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        ChangeEventData::deserialize(deserializer).map(Self::new)
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}",
            self.data.op,
            self.data.col.as_deref().unwrap_or("-"),
            self.data.doc.as_deref().unwrap_or("-")
        )
    }
}

/// Parses the height of a `"<height>-<hash>"` revision.
pub fn revision_height(rev: &str) -> Result<u64> {
    rev.split_once('-')
        .and_then(|(height, _)| height.parse::<u64>().ok())
        .filter(|height| *height > 0)
        .ok_or_else(|| Error::InvalidRevision(rev.to_string()))
}
