//! Cache Facade Module
//!
//! Public entry point. Combines the entry store, eviction engine, strategy
//! registry, codec and persistence bridge behind `set`/`get`.
//!
//! Every store mutation happens under one short, synchronous lock; the lock is
//! never held across an `.await`, so a reader racing a `set` that is still
//! compressing or persisting sees either the freshly written plain entry or a
//! miss, never a partial write.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::codec::{Codec, CodecWorker};
use crate::cache::persistence::{DurableRecord, KvStore, PersistenceBridge};
use crate::cache::strategy::{presets, CacheStrategy, StrategyRegistry};
use crate::cache::worker::BackgroundCodecWorker;
use crate::cache::{
    current_timestamp_ms, duration_to_ms, AccessLog, CacheEntry, CacheStats, EntryStore,
    EvictionEngine, Payload, Priority, StatsTracker,
};
use crate::config::CacheConfig;
use crate::error::CodecError;
use crate::tasks;

/// Values the cache can hold.
pub trait Cacheable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

// == Set Options ==
/// Per-call overrides for `set`. Unset fields fall back to the matching
/// strategy, then to the configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    pub ttl: Option<Duration>,
    pub priority: Option<Priority>,
    /// `Some(false)` skips compression for this value
    pub compress: Option<bool>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }
}

struct State<T> {
    store: EntryStore<T>,
    stats: StatsTracker,
    access: AccessLog,
}

impl<T> State<T> {
    /// Evicts whatever the engine selects to fit `incoming_bytes`.
    fn make_room(&mut self, engine: &EvictionEngine, incoming_bytes: u64) {
        for key in engine.select(&self.store, incoming_bytes) {
            if self.store.remove(&key).is_some() {
                self.stats.record_eviction();
                debug!(%key, "Evicted entry");
            }
        }
    }
}

struct Shared<T> {
    config: CacheConfig,
    eviction: EvictionEngine,
    strategies: StrategyRegistry<T>,
    codec: Codec,
    persistence: Option<PersistenceBridge>,
    state: Mutex<State<T>>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

// == Cache Builder ==
/// Assembles a `HybridCache` with its strategies and capabilities.
pub struct CacheBuilder<T> {
    config: CacheConfig,
    strategies: StrategyRegistry<T>,
    kv_store: Option<Arc<dyn KvStore>>,
    worker: Option<Arc<dyn CodecWorker>>,
    shutdown: CancellationToken,
}

impl<T: Cacheable> CacheBuilder<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            strategies: StrategyRegistry::new(),
            kv_store: None,
            worker: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Registers (or replaces) a strategy under `id`.
    pub fn strategy(mut self, id: impl Into<String>, strategy: impl CacheStrategy<T> + 'static) -> Self {
        self.strategies.register(id, Arc::new(strategy));
        self
    }

    /// Registers the built-in prefix strategies.
    pub fn default_strategies(mut self) -> Self {
        for strategy in presets::default_strategies() {
            let id = CacheStrategy::<T>::name(&strategy).to_string();
            self.strategies.register(id, Arc::new(strategy));
        }
        self
    }

    /// Attaches the durable mirror. Ignored when the configuration disables
    /// persistent storage.
    pub fn persistence(mut self, store: Arc<dyn KvStore>) -> Self {
        self.kv_store = Some(store);
        self
    }

    pub fn worker(mut self, worker: Arc<dyn CodecWorker>) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Spawns a `BackgroundCodecWorker` tied to this cache's lifetime.
    /// Must be called inside a tokio runtime.
    pub fn background_worker(mut self) -> Self {
        self.worker = Some(Arc::new(BackgroundCodecWorker::spawn(self.shutdown.clone())));
        self
    }

    pub fn build(self) -> HybridCache<T> {
        let persistence = match (self.config.persistent_storage_enabled, self.kv_store) {
            (true, Some(store)) => Some(PersistenceBridge::new(store)),
            _ => None,
        };
        let codec = Codec::new(self.worker, self.config.worker_timeout, self.shutdown.clone());

        info!(
            max_memory_bytes = self.config.max_memory_bytes,
            max_entries = self.config.max_entries,
            strategies = self.strategies.len(),
            persistent = persistence.is_some(),
            worker = codec.has_worker(),
            "Cache initialized"
        );

        HybridCache {
            shared: Arc::new(Shared {
                eviction: EvictionEngine::new(&self.config),
                config: self.config,
                strategies: self.strategies,
                codec,
                persistence,
                state: Mutex::new(State {
                    store: EntryStore::new(),
                    stats: StatsTracker::new(),
                    access: AccessLog::new(),
                }),
                shutdown: self.shutdown,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }
}

// == Hybrid Cache ==
/// In-process cache with a best-effort durable mirror. Clones share state.
pub struct HybridCache<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for HybridCache<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Cacheable> HybridCache<T> {
    /// A cache with no strategies, no durable mirror and inline compression.
    pub fn new(config: CacheConfig) -> Self {
        CacheBuilder::new(config).build()
    }

    pub fn builder(config: CacheConfig) -> CacheBuilder<T> {
        CacheBuilder::new(config)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    // == Set ==
    /// Stores `data` under `key`.
    ///
    /// The plain entry is visible to readers before this future first yields.
    /// Compression and the durable write follow; their failures are logged
    /// and never reported.
    pub async fn set(&self, key: impl Into<String>, data: T, options: SetOptions) {
        let key = key.into();
        let shared = &self.shared;

        let resolution = shared.strategies.resolve(
            &key,
            &data,
            options.ttl,
            options.priority,
            shared.config.default_ttl,
        );
        let encoded = match serde_json::to_vec(&data) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(%key, "Value not serializable, skipping cache write: {}", err);
                return;
            }
        };
        let size_bytes = (key.len() + encoded.len()) as u64;
        let mirror = shared.persistence.is_some() && resolution.priority > Priority::Low;
        let mirror_data = mirror.then(|| data.clone());

        let (generation, created_at, metadata) = {
            let mut state = shared.state.lock();
            state.store.remove(&key);
            state.make_room(&shared.eviction, size_bytes);
            let entry = CacheEntry::new(
                key.clone(),
                Payload::Plain(data),
                resolution.ttl,
                resolution.priority,
                size_bytes,
            );
            let created_at = entry.created_at;
            let metadata = entry.metadata.clone();
            let (generation, _) = state.store.put(entry);
            (generation, created_at, metadata)
        };
        debug!(
            %key,
            size_bytes,
            priority = ?resolution.priority,
            strategy = resolution.strategy.as_deref().unwrap_or("-"),
            "Stored entry"
        );

        let compress = shared.config.compression_enabled
            && options.compress.unwrap_or(true)
            && Codec::should_compress(encoded.len());
        if compress {
            let blob = shared.codec.compress(&encoded).await;
            let compressed_size = (key.len() + blob.bytes.len()) as u64;
            let smaller = blob.bytes.len() < encoded.len();
            let ratio = blob.ratio();

            let mut state = shared.state.lock();
            state.stats.record_compression(ratio);
            if smaller
                && !state.store.replace_payload(
                    &key,
                    generation,
                    Payload::Compressed(blob),
                    compressed_size,
                )
            {
                debug!(%key, "Entry replaced while compressing, keeping newer write");
            }
        }

        match (&shared.persistence, mirror_data) {
            (Some(bridge), Some(data)) => {
                let record = DurableRecord::new(
                    key,
                    data,
                    created_at,
                    resolution.ttl,
                    resolution.priority,
                    metadata,
                );
                bridge.persist(&record).await;
            }
            // An older mirror must not outlive an overwrite that is not mirrored.
            (Some(bridge), None) => bridge.remove(&key).await,
            _ => {}
        }
    }

    // == Get ==
    /// Returns the value for `key`, consulting the durable mirror on a memory
    /// miss. Expired and undecodable entries are removed and reported as
    /// misses.
    pub async fn get(&self, key: &str) -> Option<T> {
        let now = current_timestamp_ms();
        let lookup = {
            let mut state = self.shared.state.lock();
            state.access.record(key, now);
            match state.store.get(key).map(|entry| entry.is_expired_at(now)) {
                Some(true) => {
                    state.store.remove(key);
                    debug!(%key, "Expired entry removed on read");
                    None
                }
                Some(false) => state
                    .store
                    .touch(key, now)
                    .map(|entry| (entry.payload.clone(), entry.generation)),
                None => None,
            }
        };

        let value = match lookup {
            Some((Payload::Plain(value), _)) => Some(value),
            Some((Payload::Compressed(blob), generation)) => match self.decode(&blob).await {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(%key, "Dropping undecodable entry: {}", err);
                    self.shared
                        .state
                        .lock()
                        .store
                        .remove_generation(key, generation);
                    None
                }
            },
            None => self.promote(key).await,
        };

        self.record_outcome(value.is_some());
        value
    }

    /// Returns the cached value or fetches, stores and returns a fresh one.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetcher: F, options: SetOptions) -> Result<T, E>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }
        let value = fetcher(key.to_string()).await?;
        self.set(key, value.clone(), options).await;
        Ok(value)
    }

    // == Delete ==
    /// Removes `key` from memory and from the durable mirror. Returns true if
    /// it was in memory.
    pub async fn delete(&self, key: &str) -> bool {
        let removed = self.shared.state.lock().store.remove(key).is_some();
        if let Some(bridge) = &self.shared.persistence {
            bridge.remove(key).await;
        }
        removed
    }

    // == Clear ==
    /// Removes entries whose key contains `pattern`, or everything when
    /// `pattern` is `None`. A full clear also resets statistics and access
    /// records. Matching durable records are removed as well.
    pub async fn clear(&self, pattern: Option<&str>) -> usize {
        let removed = {
            let mut state = self.shared.state.lock();
            match pattern {
                None => {
                    let count = state.store.len();
                    state.store.clear();
                    state.stats.reset();
                    state.access.clear();
                    count
                }
                Some(pattern) => {
                    let doomed: Vec<String> = state
                        .store
                        .keys()
                        .into_iter()
                        .filter(|key| key.contains(pattern))
                        .collect();
                    for key in &doomed {
                        state.store.remove(key);
                    }
                    doomed.len()
                }
            }
        };

        if let Some(bridge) = &self.shared.persistence {
            match pattern {
                None => bridge.remove_matching(|_| true).await,
                Some(pattern) => bridge.remove_matching(|key| key.contains(pattern)).await,
            };
        }
        info!(pattern = pattern.unwrap_or("*"), removed, "Cache cleared");
        removed
    }

    // == Invalidate ==
    /// Removes every entry whose key or serialized value contains one of
    /// `tags`. The value check is a substring search over the JSON encoding,
    /// so it is approximate: a tag can match inside an unrelated field.
    pub async fn invalidate<S: AsRef<str>>(&self, tags: &[S]) -> usize {
        let tags: Vec<String> = tags
            .iter()
            .map(|t| t.as_ref().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tags.is_empty() {
            return 0;
        }

        let removed = {
            let mut state = self.shared.state.lock();
            let doomed: Vec<String> = state
                .store
                .iter()
                .filter(|entry| matches_tags(entry, &tags))
                .map(|entry| entry.key.clone())
                .collect();
            for key in &doomed {
                state.store.remove(key);
            }
            doomed.len()
        };

        if let Some(bridge) = &self.shared.persistence {
            bridge.invalidate(&tags).await;
        }
        debug!(?tags, removed, "Invalidated entries");
        removed
    }

    // == Preload / Warm ==
    /// Fetches the keys that are not cached and stores them at `High`
    /// priority. Fetch failures are logged and skipped. Returns how many
    /// values were stored.
    pub async fn preload<I, K, F, Fut, E>(&self, keys: I, fetcher: F) -> usize
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.load_missing(keys, fetcher, Priority::High, "preload").await
    }

    /// Like `preload`, storing at `Critical` priority.
    pub async fn warm_cache<I, K, F, Fut, E>(&self, keys: I, fetcher: F) -> usize
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.load_missing(keys, fetcher, Priority::Critical, "warm").await
    }

    async fn load_missing<I, K, F, Fut, E>(
        &self,
        keys: I,
        fetcher: F,
        priority: Priority,
        label: &str,
    ) -> usize
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut missing: Vec<String> = keys
            .into_iter()
            .map(Into::into)
            .filter(|key| !self.has(key))
            .collect();
        missing.sort();
        missing.dedup();

        let fetches = missing.into_iter().map(|key| {
            let pending = fetcher(key.clone());
            async move { (key, pending.await) }
        });
        let results = join_all(fetches).await;

        let mut loaded = 0;
        for (key, result) in results {
            match result {
                Ok(value) => {
                    self.set(key, value, SetOptions::new().with_priority(priority))
                        .await;
                    loaded += 1;
                }
                Err(err) => warn!(%key, "{} fetch failed: {}", label, err),
            }
        }
        info!(loaded, ?priority, "{} complete", label);
        loaded
    }

    // == Introspection ==
    /// True if `key` is in memory and unexpired. Does not affect statistics.
    pub fn has(&self, key: &str) -> bool {
        self.shared
            .state
            .lock()
            .store
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    /// Number of entries in memory.
    pub fn size(&self) -> usize {
        self.shared.state.lock().store.len()
    }

    pub fn memory_usage_bytes(&self) -> u64 {
        self.shared.state.lock().store.size_bytes()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        state
            .stats
            .snapshot(state.store.size_bytes(), state.store.len())
    }

    /// Most frequently read keys according to the access records.
    pub fn hot_keys(&self, limit: usize) -> Vec<(String, u64)> {
        self.shared.state.lock().access.hottest(limit)
    }

    // == Housekeeping ==
    /// Removes every expired in-memory entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.shared.state.lock();
        let expired = state.store.expired_keys(current_timestamp_ms());
        for key in &expired {
            state.store.remove(key);
        }
        expired.len()
    }

    /// Drops access records idle for longer than `access_record_max_age`.
    pub fn prune_access_records(&self) -> usize {
        let max_age = duration_to_ms(self.shared.config.access_record_max_age);
        let cutoff = current_timestamp_ms().saturating_sub(max_age);
        self.shared.state.lock().access.prune_older_than(cutoff)
    }

    /// Spawns the expiry sweep and the access-record pruning task.
    /// Must be called inside a tokio runtime.
    pub fn start_maintenance(&self) {
        if self.is_closed() {
            warn!("Cache is closed, not starting maintenance tasks");
            return;
        }
        let config = &self.shared.config;
        let cleanup = tasks::spawn_cleanup_task(
            self.clone(),
            config.cleanup_interval,
            self.shared.shutdown.clone(),
        );
        let prune = tasks::spawn_access_prune_task(
            self.clone(),
            config.access_prune_interval,
            self.shared.shutdown.clone(),
        );
        self.shared.tasks.lock().extend([cleanup, prune]);
    }

    // == Close ==
    /// Stops the housekeeping tasks and abandons in-flight worker calls.
    /// The cache keeps serving from memory; compression continues inline.
    pub fn close(&self) {
        if self.shared.shutdown.is_cancelled() {
            return;
        }
        self.shared.shutdown.cancel();
        for handle in self.shared.tasks.lock().drain(..) {
            handle.abort();
        }
        info!("Cache closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    // == Internals ==
    async fn decode(&self, blob: &crate::cache::CompressedBlob) -> Result<T, CodecError> {
        let bytes = self.shared.codec.decompress(blob).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Loads a durable copy back into memory, keeping its original creation
    /// time so the TTL keeps counting from the first write.
    async fn promote(&self, key: &str) -> Option<T> {
        let bridge = self.shared.persistence.as_ref()?;
        let record: DurableRecord<T> = bridge.load(key).await?;
        let encoded_len = serde_json::to_vec(&record.data).ok()?.len();
        let size_bytes = (key.len() + encoded_len) as u64;
        let value = record.data.clone();
        let ttl = record.ttl();

        let mut state = self.shared.state.lock();
        if !state.store.contains_key(key) {
            state.make_room(&self.shared.eviction, size_bytes);
            let mut entry = CacheEntry::restore(
                key.to_string(),
                Payload::Plain(record.data),
                record.created_at,
                ttl,
                record.priority,
                size_bytes,
            );
            entry.metadata.access_count = record.metadata.access_count + 1;
            state.store.put(entry);
            debug!(%key, "Promoted durable entry into memory");
        }
        Some(value)
    }

    fn record_outcome(&self, hit: bool) {
        let mut state = self.shared.state.lock();
        if hit {
            state.stats.record_hit();
        } else {
            state.stats.record_miss();
        }
    }
}

fn matches_tags<T: Serialize>(entry: &CacheEntry<T>, tags: &[String]) -> bool {
    if tags.iter().any(|tag| entry.key.contains(tag.as_str())) {
        return true;
    }
    let text = match &entry.payload {
        Payload::Plain(value) => serde_json::to_string(value).ok(),
        Payload::Compressed(blob) => Codec::decompress_inline(blob)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok()),
    };
    text.map(|text| tags.iter().any(|tag| text.contains(tag.as_str())))
        .unwrap_or(false)
}
