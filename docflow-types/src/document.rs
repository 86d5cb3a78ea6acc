//! Documents and dot-path access.
//!
//! Documents are plain JSON objects. Fields are addressed by dot-paths
//! (`"address.city"`); a numeric segment indexes into an array.

use serde_json::{Map, Value};

/// A document as stored and matched by the core.
pub type Document = Value;

/// Soft-deletion flag. Deleted documents stay in storage for replication
/// bookkeeping but never match a query.
pub const DELETED_FIELD: &str = "_deleted";

/// Storage revision field (`"<height>-<hash>"`).
pub const REVISION_FIELD: &str = "_rev";

/// Attachment metadata, never encrypted or matched.
pub const ATTACHMENTS_FIELD: &str = "_attachments";

/// Returns true if the document carries `_deleted: true`.
#[must_use]
pub fn is_deleted(doc: &Value) -> bool {
    doc.get(DELETED_FIELD).and_then(Value::as_bool).unwrap_or(false)
}

/// Reads the value at `path`.
#[must_use]
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Writes `value` at `path`, creating intermediate objects as needed.
///
/// Returns false when an intermediate segment exists but is neither an
/// object nor an indexable array.
pub fn set_path(doc: &mut Value, path: &str, value: Value) -> bool {
    let mut segments = path.split('.').peekable();
    let mut current = doc;

    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        current = match current {
            Value::Object(map) => {
                if last {
                    map.insert(segment.to_string(), value);
                    return true;
                }
                map.entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new()))
            }
            Value::Array(items) => {
                let Some(slot) = segment.parse::<usize>().ok().and_then(|i| items.get_mut(i))
                else {
                    return false;
                };
                if last {
                    *slot = value;
                    return true;
                }
                slot
            }
            _ => return false,
        };
    }
    false
}

/// Removes and returns the value at `path`.
pub fn remove_path(doc: &mut Value, path: &str) -> Option<Value> {
    let (parent, leaf) = match path.rsplit_once('.') {
        Some((parent, leaf)) => (get_path_mut(doc, parent)?, leaf),
        None => (doc, path),
    };
    match parent {
        Value::Object(map) => map.remove(leaf),
        _ => None,
    }
}

fn get_path_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.').try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => None,
    })
}
