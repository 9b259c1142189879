//! Cache Entry Module
//!
//! Defines individual cache entries, their priority tier and access metadata.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::cache::codec::CompressedBlob;

// == Priority ==
/// Eviction tier. Lower tiers are evicted first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

// == Entry Metadata ==
/// Size and access bookkeeping attached to every entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Accounted size of the entry (key plus encoded payload)
    pub size_bytes: u64,
    /// Number of successful reads
    pub access_count: u64,
    /// Unix milliseconds of the last read (or the write, if never read)
    pub last_accessed_at: u64,
}

// == Payload ==
/// Stored form of a value.
#[derive(Debug, Clone)]
pub enum Payload<T> {
    Plain(T),
    Compressed(CompressedBlob),
}

impl<T> Payload<T> {
    pub fn is_compressed(&self) -> bool {
        matches!(self, Payload::Compressed(_))
    }
}

// == Cache Entry ==
/// Represents a single cache entry with payload and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: String,
    pub payload: Payload<T>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    pub ttl: Duration,
    pub priority: Priority,
    pub metadata: EntryMetadata,
    /// Identifies this write; async steps use it to detect a newer write
    pub(crate) generation: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates an entry stamped with the current time.
    pub fn new(
        key: String,
        payload: Payload<T>,
        ttl: Duration,
        priority: Priority,
        size_bytes: u64,
    ) -> Self {
        let now = current_timestamp_ms();
        Self::restore(key, payload, now, ttl, priority, size_bytes)
    }

    /// Creates an entry with an existing creation time, e.g. when promoting
    /// a durable copy back into memory.
    pub fn restore(
        key: String,
        payload: Payload<T>,
        created_at: u64,
        ttl: Duration,
        priority: Priority,
        size_bytes: u64,
    ) -> Self {
        Self {
            key,
            payload,
            created_at,
            ttl,
            priority,
            metadata: EntryMetadata {
                size_bytes,
                access_count: 0,
                last_accessed_at: current_timestamp_ms(),
            },
            generation: 0,
        }
    }

    /// Unix milliseconds at which the entry stops being served.
    pub fn expires_at(&self) -> u64 {
        self.created_at.saturating_add(duration_to_ms(self.ttl))
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// Boundary condition: an entry is expired once `now >= created_at + ttl`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Returns remaining TTL in milliseconds (0 once expired).
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at().saturating_sub(current_timestamp_ms())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_to_ms)
        .unwrap_or(0)
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
