//! Entry Store Module
//!
//! In-memory map of key to entry, with the eviction index and a running byte
//! total kept in step with every mutation.

use std::collections::HashMap;

use crate::cache::{CacheEntry, EvictionIndex, Payload};

// == Entry Store ==
/// Key-value storage with size and access bookkeeping.
///
/// Invariant: `size_bytes()` equals the sum of `metadata.size_bytes` over the
/// live entries, and every live key is present in the eviction index.
#[derive(Debug)]
pub struct EntryStore<T> {
    entries: HashMap<String, CacheEntry<T>>,
    index: EvictionIndex,
    size_bytes: u64,
    next_generation: u64,
}

impl<T> Default for EntryStore<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            index: EvictionIndex::new(),
            size_bytes: 0,
            next_generation: 0,
        }
    }
}

impl<T> EntryStore<T> {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Put ==
    /// Stores an entry, replacing any previous entry under the same key.
    ///
    /// Returns the generation stamped on the new entry and the replaced entry.
    pub fn put(&mut self, mut entry: CacheEntry<T>) -> (u64, Option<CacheEntry<T>>) {
        let replaced = self.remove(&entry.key);

        self.next_generation += 1;
        entry.generation = self.next_generation;

        self.index.touch(
            &entry.key,
            entry.priority,
            entry.metadata.last_accessed_at,
        );
        self.size_bytes += entry.metadata.size_bytes;
        self.entries.insert(entry.key.clone(), entry);

        (self.next_generation, replaced)
    }

    // == Get ==
    /// Returns an entry without touching its access bookkeeping.
    pub fn get(&self, key: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    // == Touch ==
    /// Records a read of `key` at `now` and returns the updated entry.
    pub fn touch(&mut self, key: &str, now: u64) -> Option<&CacheEntry<T>> {
        let entry = self.entries.get_mut(key)?;
        entry.metadata.access_count += 1;
        entry.metadata.last_accessed_at = now;
        self.index.touch(key, entry.priority, now);
        Some(entry)
    }

    // == Remove ==
    /// Removes an entry by key, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.entries.remove(key)?;
        self.index.remove(key);
        self.size_bytes -= entry.metadata.size_bytes;
        Some(entry)
    }

    /// Removes `key` only if it still holds the write stamped `generation`.
    pub fn remove_generation(&mut self, key: &str, generation: u64) -> Option<CacheEntry<T>> {
        match self.entries.get(key) {
            Some(entry) if entry.generation == generation => self.remove(key),
            _ => None,
        }
    }

    // == Replace Payload ==
    /// Swaps the payload of `key` if it still holds the write stamped
    /// `generation`, adjusting the byte total. Returns true on success.
    pub fn replace_payload(
        &mut self,
        key: &str,
        generation: u64,
        payload: Payload<T>,
        size_bytes: u64,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        if entry.generation != generation {
            return false;
        }
        self.size_bytes = self.size_bytes - entry.metadata.size_bytes + size_bytes;
        entry.metadata.size_bytes = size_bytes;
        entry.payload = payload;
        true
    }

    /// Entries in eviction order: lowest priority, least recently accessed first.
    pub fn eviction_candidates(&self) -> impl Iterator<Item = &CacheEntry<T>> {
        self.index
            .iter()
            .filter_map(|position| self.entries.get(&position.key))
    }

    /// Keys of entries expired at `now`.
    pub fn expired_keys(&self, now: u64) -> Vec<String> {
        self.entries
            .values()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry<T>> {
        self.entries.values()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Sum of the accounted sizes of all live entries.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.size_bytes = 0;
    }
}
