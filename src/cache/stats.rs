//! Cache Statistics Module
//!
//! Tracks hit/miss behaviour as exponential moving averages, plus evictions
//! and the running compression ratio.

use serde::Serialize;

/// Weight of the newest observation in every moving average.
pub const RATE_WEIGHT: f64 = 0.1;

// == Cache Stats ==
/// Point-in-time statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Sum of accounted entry sizes
    pub memory_usage_bytes: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Moving average of read hits
    pub hit_rate: f64,
    /// Moving average of read misses
    pub miss_rate: f64,
    /// Entries removed under memory or count pressure
    pub eviction_count: u64,
    /// Moving average of `compressed / original` sizes (1.0 before any compression)
    pub compression_ratio: f64,
    /// Cumulative successful reads
    pub hits: u64,
    /// Cumulative failed reads
    pub misses: u64,
}

// == Stats Tracker ==
/// Mutable counters behind `CacheStats`.
///
/// The first observation seeds each average directly, so `hit_rate + miss_rate`
/// is 1.0 after every observation.
#[derive(Debug, Clone)]
pub struct StatsTracker {
    hit_rate: f64,
    miss_rate: f64,
    observed: bool,
    hits: u64,
    misses: u64,
    evictions: u64,
    compression_ratio: f64,
    compressions: u64,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self {
            hit_rate: 0.0,
            miss_rate: 0.0,
            observed: false,
            hits: 0,
            misses: 0,
            evictions: 0,
            compression_ratio: 1.0,
            compressions: 0,
        }
    }
}

fn blend(current: f64, sample: f64) -> f64 {
    current * (1.0 - RATE_WEIGHT) + sample * RATE_WEIGHT
}

impl StatsTracker {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Hit / Miss ==
    pub fn record_hit(&mut self) {
        self.hits += 1;
        self.observe(1.0);
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
        self.observe(0.0);
    }

    fn observe(&mut self, outcome: f64) {
        if self.observed {
            self.hit_rate = blend(self.hit_rate, outcome);
            self.miss_rate = blend(self.miss_rate, 1.0 - outcome);
        } else {
            self.hit_rate = outcome;
            self.miss_rate = 1.0 - outcome;
            self.observed = true;
        }
    }

    // == Record Eviction ==
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Record Compression ==
    pub fn record_compression(&mut self, ratio: f64) {
        self.compression_ratio = if self.compressions == 0 {
            ratio
        } else {
            blend(self.compression_ratio, ratio)
        };
        self.compressions += 1;
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Resets every counter and average.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Builds a snapshot given the store's current totals.
    pub fn snapshot(&self, memory_usage_bytes: u64, total_entries: usize) -> CacheStats {
        CacheStats {
            memory_usage_bytes,
            total_entries,
            hit_rate: self.hit_rate,
            miss_rate: self.miss_rate,
            eviction_count: self.evictions,
            compression_ratio: self.compression_ratio,
            hits: self.hits,
            misses: self.misses,
        }
    }
}
