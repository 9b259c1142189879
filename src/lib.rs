//! Hybrid Cache - an in-process cache with a durable mirror
//!
//! Priority-aware eviction, optional payload compression and a best-effort
//! persistent copy for important entries, plus an HTTP front end.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{CacheBuilder, HybridCache, Priority, SetOptions};
pub use config::{CacheConfig, Config};
