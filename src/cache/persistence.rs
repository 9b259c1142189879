//! Persistence Bridge Module
//!
//! Best-effort mirror of cache entries into a host key-value store. Nothing in
//! this module returns an error to the cache: failures are logged and the
//! operation degrades to a miss or a dropped write.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{current_timestamp_ms, duration_to_ms, EntryMetadata, Priority};
use crate::error::StorageError;

/// Namespace prefix of every durable key.
pub const DURABLE_KEY_PREFIX: &str = "cache:";

/// Format tag written into every durable record.
pub const DURABLE_RECORD_VERSION: u32 = 1;

// == KV Store Capability ==
/// Host-provided persistent key-value storage.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
    async fn keys(&self) -> Result<Vec<String>, StorageError>;
}

// == Durable Record ==
/// Serialized form of one mirrored entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurableRecord<T> {
    pub version: u32,
    pub key: String,
    pub data: T,
    /// Unix milliseconds
    pub created_at: u64,
    pub ttl_ms: u64,
    pub priority: Priority,
    pub metadata: EntryMetadata,
}

impl<T> DurableRecord<T> {
    pub fn new(
        key: String,
        data: T,
        created_at: u64,
        ttl: Duration,
        priority: Priority,
        metadata: EntryMetadata,
    ) -> Self {
        Self {
            version: DURABLE_RECORD_VERSION,
            key,
            data,
            created_at,
            ttl_ms: duration_to_ms(ttl),
            priority,
            metadata,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.created_at.saturating_add(self.ttl_ms)
    }
}

/// Only the fields needed to judge expiry, so sweeps work for any value type.
#[derive(Deserialize)]
struct RecordHeader {
    version: u32,
    created_at: u64,
    ttl_ms: u64,
}

pub fn durable_key(key: &str) -> String {
    format!("{}{}", DURABLE_KEY_PREFIX, key)
}

// == Persistence Bridge ==
#[derive(Clone)]
pub struct PersistenceBridge {
    store: Arc<dyn KvStore>,
}

impl PersistenceBridge {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    // == Persist ==
    /// Writes a durable copy. On a quota failure, sweeps expired records and
    /// retries once; a second failure drops the write.
    ///
    /// A dropped write also deletes any older copy under the same key, so a
    /// later promotion cannot resurrect a superseded value.
    ///
    /// Returns true if the record was stored.
    pub async fn persist<T: Serialize>(&self, record: &DurableRecord<T>) -> bool {
        let stored = self.write_record(record).await;
        if !stored {
            self.remove(&record.key).await;
        }
        stored
    }

    async fn write_record<T: Serialize>(&self, record: &DurableRecord<T>) -> bool {
        let value = match serde_json::to_string(record) {
            Ok(value) => value,
            Err(err) => {
                warn!(key = %record.key, "Durable record not serializable: {}", err);
                return false;
            }
        };
        let storage_key = durable_key(&record.key);

        match self.store.set(&storage_key, value.clone()).await {
            Ok(()) => return true,
            Err(err) if err.is_quota_exceeded() => {
                let swept = self.sweep_expired().await;
                info!(
                    key = %record.key,
                    swept,
                    "Storage quota exceeded, retrying after sweeping expired records"
                );
            }
            Err(err) => {
                warn!(key = %record.key, "Durable write failed: {}", err);
                return false;
            }
        }

        match self.store.set(&storage_key, value).await {
            Ok(()) => true,
            Err(err) => {
                warn!(key = %record.key, "Dropping durable write after retry: {}", err);
                false
            }
        }
    }

    // == Load ==
    /// Reads a durable copy. Expired, corrupt, or foreign-version records are
    /// deleted and reported as absent.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<DurableRecord<T>> {
        let storage_key = durable_key(key);
        let raw = match self.store.get(&storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(%key, "Durable read failed: {}", err);
                return None;
            }
        };

        let record: DurableRecord<T> = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(err) => {
                warn!(%key, "Purging corrupt durable record: {}", err);
                self.remove(key).await;
                return None;
            }
        };

        if record.version != DURABLE_RECORD_VERSION {
            debug!(%key, version = record.version, "Purging durable record of unknown version");
            self.remove(key).await;
            return None;
        }
        if record.is_expired_at(current_timestamp_ms()) {
            debug!(%key, "Purging expired durable record");
            self.remove(key).await;
            return None;
        }
        Some(record)
    }

    pub async fn remove(&self, key: &str) {
        if let Err(err) = self.store.remove(&durable_key(key)).await {
            warn!(%key, "Durable remove failed: {}", err);
        }
    }

    // == Remove Matching ==
    /// Removes durable records whose original key satisfies `matches`.
    pub async fn remove_matching<F>(&self, matches: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut removed = 0;
        for original in self.original_keys().await {
            if matches(&original) {
                self.remove(&original).await;
                removed += 1;
            }
        }
        removed
    }

    // == Invalidate ==
    /// Removes durable records whose key or serialized value contains any of
    /// `tags`. The value check is a plain substring search over the stored
    /// JSON and can match field content loosely.
    pub async fn invalidate(&self, tags: &[String]) -> usize {
        let mut removed = 0;
        for original in self.original_keys().await {
            let hit = if tags.iter().any(|tag| original.contains(tag.as_str())) {
                true
            } else {
                match self.store.get(&durable_key(&original)).await {
                    Ok(Some(raw)) => match serde_json::from_str::<DurableRecord<serde_json::Value>>(&raw) {
                        Ok(record) => {
                            let text = record.data.to_string();
                            tags.iter().any(|tag| text.contains(tag.as_str()))
                        }
                        Err(_) => false,
                    },
                    _ => false,
                }
            };
            if hit {
                self.remove(&original).await;
                removed += 1;
            }
        }
        removed
    }

    // == Sweep Expired ==
    /// Deletes every durable record that is expired, unreadable, or of an
    /// unknown version. Returns the number deleted.
    pub async fn sweep_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut removed = 0;
        for original in self.original_keys().await {
            let stale = match self.store.get(&durable_key(&original)).await {
                Ok(Some(raw)) => match serde_json::from_str::<RecordHeader>(&raw) {
                    Ok(header) => {
                        header.version != DURABLE_RECORD_VERSION
                            || now >= header.created_at.saturating_add(header.ttl_ms)
                    }
                    Err(_) => true,
                },
                Ok(None) => false,
                Err(err) => {
                    warn!(key = %original, "Durable read failed during sweep: {}", err);
                    false
                }
            };
            if stale {
                self.remove(&original).await;
                removed += 1;
            }
        }
        removed
    }

    /// Original cache keys of every durable record.
    async fn original_keys(&self) -> Vec<String> {
        match self.store.keys().await {
            Ok(keys) => keys
                .into_iter()
                .filter_map(|k| k.strip_prefix(DURABLE_KEY_PREFIX).map(str::to_string))
                .collect(),
            Err(err) => {
                warn!("Listing durable keys failed: {}", err);
                Vec::new()
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;

    fn metadata() -> EntryMetadata {
        EntryMetadata {
            size_bytes: 10,
            access_count: 0,
            last_accessed_at: current_timestamp_ms(),
        }
    }

    fn record(key: &str, data: &str, ttl_ms: u64) -> DurableRecord<String> {
        DurableRecord::new(
            key.to_string(),
            data.to_string(),
            current_timestamp_ms(),
            Duration::from_millis(ttl_ms),
            Priority::High,
            metadata(),
        )
    }

    fn bridge(store: Arc<MemoryKvStore>) -> PersistenceBridge {
        PersistenceBridge::new(store)
    }

    #[test]
    fn test_durable_key_namespace() {
        assert_eq!(durable_key("user:1"), "cache:user:1");
    }

    #[tokio::test]
    async fn test_persist_and_load() {
        let store = Arc::new(MemoryKvStore::new());
        let bridge = bridge(store.clone());

        assert!(bridge.persist(&record("k", "v", 60_000)).await);
        assert!(store.get("cache:k").await.unwrap().is_some());

        let loaded: DurableRecord<String> = bridge.load("k").await.unwrap();
        assert_eq!(loaded.data, "v");
        assert_eq!(loaded.version, DURABLE_RECORD_VERSION);
    }

    #[tokio::test]
    async fn test_corrupt_record_purged() {
        let store = Arc::new(MemoryKvStore::new());
        store.set("cache:bad", "{not json".to_string()).await.unwrap();
        let bridge = bridge(store.clone());

        assert!(bridge.load::<String>("bad").await.is_none());
        assert!(store.get("cache:bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_version_purged() {
        let store = Arc::new(MemoryKvStore::new());
        let mut old = record("k", "v", 60_000);
        old.version = 0;
        store
            .set("cache:k", serde_json::to_string(&old).unwrap())
            .await
            .unwrap();
        let bridge = bridge(store.clone());

        assert!(bridge.load::<String>("k").await.is_none());
        assert!(store.get("cache:k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_record_purged_on_load() {
        let store = Arc::new(MemoryKvStore::new());
        let bridge = bridge(store.clone());
        bridge.persist(&record("k", "v", 10)).await;

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(bridge.load::<String>("k").await.is_none());
        assert!(store.get("cache:k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_quota_sweep_then_retry() {
        let sample = serde_json::to_string(&record("a", "v", 10)).unwrap();
        let quota = ("cache:a".len() + sample.len()) as u64 * 2 + 8;
        let store = Arc::new(MemoryKvStore::with_quota(quota));
        let bridge = bridge(store.clone());

        assert!(bridge.persist(&record("a", "v", 10)).await);
        assert!(bridge.persist(&record("b", "v", 10)).await);
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(bridge.persist(&record("c", "v", 60_000)).await);
        assert!(store.get("cache:a").await.unwrap().is_none());
        assert!(store.get("cache:c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_quota_drop_after_retry() {
        let store = Arc::new(MemoryKvStore::with_quota(16));
        let bridge = bridge(store.clone());

        assert!(!bridge.persist(&record("k", "v", 60_000)).await);
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_overwrite_removes_older_copy() {
        let small = serde_json::to_string(&record("k", "v1", 60_000)).unwrap();
        let quota = ("cache:k".len() + small.len()) as u64 + 8;
        let store = Arc::new(MemoryKvStore::with_quota(quota));
        let bridge = bridge(store.clone());

        assert!(bridge.persist(&record("k", "v1", 60_000)).await);
        let larger = "x".repeat(100);
        assert!(!bridge.persist(&record("k", &larger, 60_000)).await);

        assert!(store.get("cache:k").await.unwrap().is_none());
        assert!(bridge.load::<String>("k").await.is_none());
    }

    #[test]
    fn test_unbounded_ttl_saturates() {
        let record = DurableRecord::new(
            "k".to_string(),
            "v".to_string(),
            current_timestamp_ms(),
            Duration::MAX,
            Priority::High,
            metadata(),
        );
        assert_eq!(record.ttl_ms, u64::MAX);
        assert!(!record.is_expired_at(current_timestamp_ms()));
    }

    #[tokio::test]
    async fn test_sweep_leaves_foreign_keys() {
        let store = Arc::new(MemoryKvStore::new());
        store.set("settings", "{}".to_string()).await.unwrap();
        let bridge = bridge(store.clone());
        bridge.persist(&record("k", "v", 10)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(bridge.sweep_expired().await, 1);
        assert!(store.get("settings").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_matching_and_invalidate() {
        let store = Arc::new(MemoryKvStore::new());
        let bridge = bridge(store.clone());
        bridge.persist(&record("voice:1", "hello", 60_000)).await;
        bridge.persist(&record("user:1", "alice", 60_000)).await;
        bridge.persist(&record("user:2", "bob", 60_000)).await;

        assert_eq!(bridge.remove_matching(|k| k.contains("voice")).await, 1);
        assert_eq!(bridge.invalidate(&["alice".to_string()]).await, 1);
        assert_eq!(store.keys().await.unwrap(), vec!["cache:user:2".to_string()]);
    }
}
