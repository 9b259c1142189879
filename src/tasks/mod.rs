//! Background Tasks Module
//!
//! Periodic housekeeping started by `HybridCache::start_maintenance`.
//!
//! # Tasks
//! - Expiry sweep: removes expired entries at `cleanup_interval`
//! - Access pruning: drops idle access records at `access_prune_interval`

mod cleanup;

pub use cleanup::{spawn_access_prune_task, spawn_cleanup_task, MIN_TASK_INTERVAL};
