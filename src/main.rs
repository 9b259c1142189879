//! Hybrid Cache server binary
//!
//! Serves a `HybridCache<serde_json::Value>` over HTTP, mirroring important
//! entries to a directory on disk.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hybrid_cache::storage::FileKvStore;
use hybrid_cache::{create_router, AppState, Config, HybridCache};

/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the durable mirror directory
/// 4. Build the cache with the preset strategies and start housekeeping
/// 5. Serve HTTP until SIGINT/SIGTERM, then close the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hybrid_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Hybrid Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_entries={}, max_memory={}B, default_ttl={:?}, port={}",
        config.cache.max_entries,
        config.cache.max_memory_bytes,
        config.cache.default_ttl,
        config.server_port
    );

    let mut builder =
        HybridCache::<serde_json::Value>::builder(config.cache.clone()).default_strategies();
    if config.cache.persistent_storage_enabled {
        let store = FileKvStore::open(&config.data_dir, config.storage_quota_bytes)
            .await
            .with_context(|| format!("opening data dir {}", config.data_dir.display()))?;
        builder = builder.persistence(Arc::new(store));
    }
    if config.worker_enabled {
        builder = builder.background_worker();
    }
    let cache = builder.build();
    cache.start_maintenance();

    let app = create_router(AppState::new(cache.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    cache.close();
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
