//! Bounded history of recent change events.

use docflow_types::ChangeEvent;
use std::collections::{HashMap, VecDeque};

/// Ring of the most recent change events of a collection.
///
/// Every pushed event gets the next sequence number, starting at 1, and
/// [`counter`](Self::counter) is the sequence number of the newest event.
/// Consumers remember a pointer and later ask for everything from it.
#[derive(Debug, Clone)]
pub struct ChangeEventBuffer {
    limit: usize,
    counter: u64,
    events: VecDeque<ChangeEvent>,
}

impl ChangeEventBuffer {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            counter: 0,
            events: VecDeque::with_capacity(limit),
        }
    }

    /// Appends an event, evicting the oldest one when full. Returns the
    /// event's sequence number.
    pub fn push(&mut self, event: ChangeEvent) -> u64 {
        if self.events.len() == self.limit {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.counter += 1;
        self.counter
    }

    /// Number of events ever pushed.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sequence number of the oldest retained event.
    fn oldest(&self) -> u64 {
        self.counter - self.events.len() as u64 + 1
    }

    /// Events with a sequence number of at least `pointer`, oldest first.
    ///
    /// Returns `None` when some of them were already evicted; the caller has
    /// missed events and must recompute from scratch.
    pub fn get_from(&self, pointer: u64) -> Option<Vec<ChangeEvent>> {
        let pointer = pointer.max(1);
        let oldest = self.oldest();
        if pointer < oldest {
            return None;
        }
        let skip = usize::try_from(pointer - oldest).unwrap_or(usize::MAX);
        Some(self.events.iter().skip(skip).cloned().collect())
    }

    /// Keeps only the last event of every document, in the order those last
    /// events happened. Events without a document id are all kept.
    pub fn reduce_by_last_of_doc(events: &[ChangeEvent]) -> Vec<ChangeEvent> {
        let mut last: HashMap<&str, usize> = HashMap::new();
        for (position, event) in events.iter().enumerate() {
            if let Some(doc) = event.doc_id() {
                last.insert(doc, position);
            }
        }
        events
            .iter()
            .enumerate()
            .filter(|(position, event)| {
                event
                    .doc_id()
                    .is_none_or(|doc| last.get(doc) == Some(position))
            })
            .map(|(_, event)| event.clone())
            .collect()
    }
}
