//! Configuration Module
//!
//! Engine limits (`CacheConfig`) and server settings (`Config`), loaded from
//! environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::duration_to_ms;

/// Engine limits and housekeeping cadence. Immutable once a cache is built.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Soft memory ceiling in bytes
    pub max_memory_bytes: u64,
    /// TTL applied when neither the caller nor a strategy supplies one
    pub default_ttl: Duration,
    /// Hard cap on the number of live entries
    pub max_entries: usize,
    /// Whether large payloads are compressed
    pub compression_enabled: bool,
    /// Whether entries above `Low` priority are mirrored to the KV store
    pub persistent_storage_enabled: bool,
    /// Interval of the expiry sweep
    pub cleanup_interval: Duration,
    /// Interval of the access-record pruning task
    pub access_prune_interval: Duration,
    /// Access records idle for longer than this are pruned
    pub access_record_max_age: Duration,
    /// Upper bound on a single codec worker round-trip
    pub worker_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: 50 * 1024 * 1024,
            default_ttl: Duration::from_millis(300_000),
            max_entries: 10_000,
            compression_enabled: true,
            persistent_storage_enabled: true,
            cleanup_interval: Duration::from_secs(5 * 60),
            access_prune_interval: Duration::from_secs(60 * 60),
            access_record_max_age: Duration::from_secs(60 * 60),
            worker_timeout: Duration::from_secs(5),
        }
    }
}

impl CacheConfig {
    /// Loads engine limits from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_MEMORY_USAGE` - Memory ceiling in bytes (default: 50 MiB)
    /// - `DEFAULT_TTL` - Default TTL in milliseconds (default: 300000)
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 10000)
    /// - `COMPRESSION_ENABLED` - Compress large payloads (default: true)
    /// - `PERSISTENT_STORAGE` - Mirror entries to disk (default: true)
    /// - `CLEANUP_INTERVAL` - Expiry sweep frequency in seconds (default: 300, minimum: 1)
    /// - `ACCESS_PRUNE_INTERVAL` - Access-record pruning frequency in seconds (default: 3600, minimum: 1)
    /// - `WORKER_TIMEOUT_MS` - Codec worker timeout in milliseconds (default: 5000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_memory_bytes: env_or("MAX_MEMORY_USAGE", defaults.max_memory_bytes),
            default_ttl: Duration::from_millis(env_or(
                "DEFAULT_TTL",
                duration_to_ms(defaults.default_ttl),
            )),
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            compression_enabled: env_or("COMPRESSION_ENABLED", defaults.compression_enabled),
            persistent_storage_enabled: env_or(
                "PERSISTENT_STORAGE",
                defaults.persistent_storage_enabled,
            ),
            // zero would make the housekeeping loops spin
            cleanup_interval: Duration::from_secs(
                env_or("CLEANUP_INTERVAL", defaults.cleanup_interval.as_secs()).max(1),
            ),
            access_prune_interval: Duration::from_secs(
                env_or(
                    "ACCESS_PRUNE_INTERVAL",
                    defaults.access_prune_interval.as_secs(),
                )
                .max(1),
            ),
            access_record_max_age: defaults.access_record_max_age,
            worker_timeout: Duration::from_millis(env_or(
                "WORKER_TIMEOUT_MS",
                duration_to_ms(defaults.worker_timeout),
            )),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Engine limits
    pub cache: CacheConfig,
    /// HTTP server port
    pub server_port: u16,
    /// Directory backing the durable mirror
    pub data_dir: PathBuf,
    /// Byte quota of the durable mirror
    pub storage_quota_bytes: u64,
    /// Whether compression runs on the background worker
    pub worker_enabled: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DATA_DIR` - Durable mirror directory (default: ./cache-data)
    /// - `STORAGE_QUOTA` - Durable mirror quota in bytes (default: 5 MiB)
    /// - `CODEC_WORKER` - Run compression on a background worker (default: true)
    ///
    /// Engine limits are read by [`CacheConfig::from_env`].
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache: CacheConfig::from_env(),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            storage_quota_bytes: env_or("STORAGE_QUOTA", defaults.storage_quota_bytes),
            worker_enabled: env_or("CODEC_WORKER", defaults.worker_enabled),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            server_port: 3000,
            data_dir: PathBuf::from("./cache-data"),
            storage_quota_bytes: 5 * 1024 * 1024,
            worker_enabled: true,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.max_memory_bytes, 52_428_800);
        assert_eq!(config.default_ttl, Duration::from_millis(300_000));
        assert_eq!(config.max_entries, 10_000);
        assert!(config.compression_enabled);
        assert!(config.persistent_storage_enabled);
        assert_eq!(config.cleanup_interval, Duration::from_secs(300));
        assert_eq!(config.access_prune_interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.data_dir, PathBuf::from("./cache-data"));
        assert!(config.worker_enabled);
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("HYBRID_CACHE_TEST_GARBAGE", "not-a-number");
        let value: u64 = env_or("HYBRID_CACHE_TEST_GARBAGE", 42);
        assert_eq!(value, 42);
        env::remove_var("HYBRID_CACHE_TEST_GARBAGE");
    }

    #[test]
    fn test_env_or_reads_value() {
        env::set_var("HYBRID_CACHE_TEST_BOOL", "false");
        let value: bool = env_or("HYBRID_CACHE_TEST_BOOL", true);
        assert!(!value);
        env::remove_var("HYBRID_CACHE_TEST_BOOL");
    }

    #[test]
    fn test_zero_intervals_raised_to_one_second() {
        env::set_var("CLEANUP_INTERVAL", "0");
        env::set_var("ACCESS_PRUNE_INTERVAL", "0");
        let config = CacheConfig::from_env();
        env::remove_var("CLEANUP_INTERVAL");
        env::remove_var("ACCESS_PRUNE_INTERVAL");

        assert_eq!(config.cleanup_interval, Duration::from_secs(1));
        assert_eq!(config.access_prune_interval, Duration::from_secs(1));
    }
}
