//! Eviction Engine Module
//!
//! Pure selection of entries to remove under memory or count pressure.

use crate::cache::{EntryStore, Priority};
use crate::config::CacheConfig;

// == Eviction Engine ==
/// Picks victims in `(priority, last access)` order.
///
/// Non-critical tiers are drained first. Critical entries are taken for
/// memory pressure only when the bytes still required after the lower tiers
/// exceed half of `max_memory_bytes`; critical entries therefore tolerate up
/// to 50% overshoot. The entry-count cap is hard and may reach critical
/// entries whenever lower tiers cannot satisfy it.
#[derive(Debug, Clone, Copy)]
pub struct EvictionEngine {
    max_memory_bytes: u64,
    max_entries: usize,
}

impl EvictionEngine {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            max_memory_bytes: config.max_memory_bytes,
            max_entries: config.max_entries,
        }
    }

    /// True when inserting `incoming_bytes` as a new entry breaks a limit.
    pub fn is_under_pressure<T>(&self, store: &EntryStore<T>, incoming_bytes: u64) -> bool {
        store.size_bytes() + incoming_bytes > self.max_memory_bytes
            || store.len() >= self.max_entries
    }

    // == Select ==
    /// Returns the keys to evict before inserting a new entry of
    /// `incoming_bytes`. The store is not modified.
    pub fn select<T>(&self, store: &EntryStore<T>, incoming_bytes: u64) -> Vec<String> {
        if !self.is_under_pressure(store, incoming_bytes) {
            return Vec::new();
        }

        let bytes_needed =
            (store.size_bytes() + incoming_bytes).saturating_sub(self.max_memory_bytes);
        let count_needed = (store.len() + 1).saturating_sub(self.max_entries);

        let mut victims = Vec::new();
        let mut freed = 0u64;

        for entry in store
            .eviction_candidates()
            .filter(|e| e.priority != Priority::Critical)
        {
            if freed >= bytes_needed && victims.len() >= count_needed {
                break;
            }
            freed += entry.metadata.size_bytes;
            victims.push(entry.key.clone());
        }

        if freed >= bytes_needed && victims.len() >= count_needed {
            return victims;
        }

        let still_required = bytes_needed.saturating_sub(freed);
        let reach_critical_for_memory = still_required > self.max_memory_bytes / 2;

        for entry in store
            .eviction_candidates()
            .filter(|e| e.priority == Priority::Critical)
        {
            let bytes_short = reach_critical_for_memory && freed < bytes_needed;
            let count_short = victims.len() < count_needed;
            if !bytes_short && !count_short {
                break;
            }
            freed += entry.metadata.size_bytes;
            victims.push(entry.key.clone());
        }

        victims
    }
}
