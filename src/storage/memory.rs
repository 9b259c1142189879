//! In-memory KV store with a byte quota.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cache::KvStore;
use crate::error::StorageError;

#[derive(Debug, Default)]
struct Inner {
    values: BTreeMap<String, String>,
    used_bytes: u64,
}

/// Map-backed `KvStore`. Usage is counted as key bytes plus value bytes.
#[derive(Debug)]
pub struct MemoryKvStore {
    inner: Mutex<Inner>,
    quota_bytes: u64,
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKvStore {
    /// Unbounded store.
    pub fn new() -> Self {
        Self::with_quota(u64::MAX)
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            quota_bytes,
        }
    }

    pub fn used_bytes(&self) -> u64 {
        self.inner.lock().used_bytes
    }

    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn footprint(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.inner.lock().values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        let released = inner
            .values
            .get(key)
            .map(|old| footprint(key, old))
            .unwrap_or(0);
        let needed = footprint(key, &value);
        let available = self.quota_bytes.saturating_sub(inner.used_bytes - released);
        if needed > available {
            return Err(StorageError::QuotaExceeded { needed, available });
        }
        inner.used_bytes = inner.used_bytes - released + needed;
        inner.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if let Some(old) = inner.values.remove(key) {
            inner.used_bytes -= footprint(key, &old);
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.inner.lock().values.keys().cloned().collect())
    }
}
