//! Cache Module
//!
//! Hybrid cache engine: an in-process entry store with priority-aware
//! eviction, optional compression and a best-effort durable mirror.

mod access;
mod codec;
mod entry;
mod eviction;
mod facade;
mod index;
mod persistence;
mod stats;
mod store;
mod strategy;
mod worker;


// Re-export public types
pub use access::{AccessLog, AccessRecord};
pub use codec::{
    compress_block, decompress_block, process_request, Codec, CodecAction, CodecWorker,
    CompressedBlob, WorkerReply, WorkerRequest, COMPRESSION_THRESHOLD_BYTES,
};
pub use entry::{
    current_timestamp_ms, duration_to_ms, CacheEntry, EntryMetadata, Payload, Priority,
};
pub use eviction::EvictionEngine;
pub use facade::{CacheBuilder, Cacheable, HybridCache, SetOptions};
pub use index::{EvictionIndex, IndexKey};
pub use persistence::{
    durable_key, DurableRecord, KvStore, PersistenceBridge, DURABLE_KEY_PREFIX,
    DURABLE_RECORD_VERSION,
};
pub use stats::{CacheStats, StatsTracker, RATE_WEIGHT};
pub use store::EntryStore;
pub use strategy::{presets, CacheStrategy, PrefixStrategy, Resolution, StrategyRegistry};
pub use worker::BackgroundCodecWorker;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
