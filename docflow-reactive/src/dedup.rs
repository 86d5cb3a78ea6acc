//! Bounded memory of recently seen keys.

use std::collections::{HashSet, VecDeque};

/// Remembers the last `capacity` distinct keys.
///
/// Used to deliver a mutation once when it reaches an instance over more
/// than one path: the storage feed and a direct emit, or a sibling's
/// broadcast and the instance's own storage watcher.
#[derive(Debug, Clone)]
pub struct RecentKeys {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl RecentKeys {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Remembers `key`. Returns false if it was already remembered.
    pub fn insert(&mut self, key: String) -> bool {
        if self.members.contains(&key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.members.insert(key.clone());
        self.order.push_back(key);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.members.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Dedup key of document `id` at storage revision `rev`.
pub(crate) fn revision_key(id: &str, rev: &str) -> String {
    format!("{}@{}", id, rev)
}
