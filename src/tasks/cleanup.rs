//! Housekeeping Tasks
//!
//! Periodic expiry sweep and access-record pruning. Both stop when the
//! cache's shutdown token is cancelled.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{Cacheable, HybridCache};

/// Shortest period either loop will sleep between runs.
pub const MIN_TASK_INTERVAL: Duration = Duration::from_millis(10);

fn effective_interval(interval: Duration) -> Duration {
    if interval < MIN_TASK_INTERVAL {
        warn!(
            "Task interval {:?} is below the minimum, using {:?}",
            interval, MIN_TASK_INTERVAL
        );
        return MIN_TASK_INTERVAL;
    }
    interval
}

/// Spawns a task that removes expired entries every `interval`.
///
/// # Example
/// ```ignore
/// let shutdown = CancellationToken::new();
/// let handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(300), shutdown.clone());
/// // Later, during shutdown:
/// shutdown.cancel();
/// ```
pub fn spawn_cleanup_task<T: Cacheable>(
    cache: HybridCache<T>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let interval = effective_interval(interval);
    tokio::spawn(async move {
        info!("Starting expiry sweep with interval of {:?}", interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let removed = cache.purge_expired();
            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
        debug!("Expiry sweep stopped");
    })
}

/// Spawns a task that drops stale access records every `interval`.
pub fn spawn_access_prune_task<T: Cacheable>(
    cache: HybridCache<T>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let interval = effective_interval(interval);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let pruned = cache.prune_access_records();
            debug!("Access pruning: dropped {} stale records", pruned);
        }
    })
}
