//! Eviction Index Module
//!
//! Orders keys by `(priority, last access)` for eviction selection.

use std::collections::{BTreeSet, HashMap};

use crate::cache::Priority;

// == Index Key ==
/// Position of one key in the eviction order.
///
/// Field order matters: the derived `Ord` sorts by priority, then recency,
/// then insertion sequence (ties within the same millisecond).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexKey {
    pub priority: Priority,
    pub last_accessed_at: u64,
    seq: u64,
    pub key: String,
}

// == Eviction Index ==
/// Tracks eviction order for every live key.
///
/// Iteration yields the best eviction candidate first:
/// lowest priority, then least recently accessed.
#[derive(Debug, Default)]
pub struct EvictionIndex {
    order: BTreeSet<IndexKey>,
    positions: HashMap<String, IndexKey>,
    next_seq: u64,
}

impl EvictionIndex {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Records an access of `key` at `at`, moving it behind every key of the
    /// same priority that was accessed earlier.
    pub fn touch(&mut self, key: &str, priority: Priority, at: u64) {
        self.remove(key);
        self.next_seq += 1;
        let position = IndexKey {
            priority,
            last_accessed_at: at,
            seq: self.next_seq,
            key: key.to_string(),
        };
        self.order.insert(position.clone());
        self.positions.insert(key.to_string(), position);
    }

    // == Remove ==
    /// Removes a key from the index. Returns true if it was tracked.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.positions.remove(key) {
            Some(position) => {
                self.order.remove(&position);
                true
            }
            None => false,
        }
    }

    /// Candidates in eviction order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexKey> {
        self.order.iter()
    }

    // == Peek Oldest ==
    /// Returns the first eviction candidate without removing it.
    pub fn peek_oldest(&self) -> Option<&IndexKey> {
        self.order.first()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.positions.clear();
    }
}
