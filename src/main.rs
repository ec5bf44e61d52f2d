//! Cacheweb - A static file server with a frequency-weighted file cache
//!
//! Serves a directory over HTTP, keeping hot files in a size-bounded memory
//! cache whose admission and eviction are driven by decaying hit counts.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cacheweb::api::{create_router, AppState};
use cacheweb::cache::FileCache;
use cacheweb::config::Config;

/// Main entry point for the file server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from the config file and environment variables
/// 3. Create the file cache with configured parameters
/// 4. Create Axum router
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cacheweb=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cacheweb file server");

    let config = Config::load();
    info!(
        "Configuration loaded: root={}, port={}, cache_budget={}, index={:?}, show_directory={}",
        config.root.display(),
        config.port,
        config.cache_budget,
        config.index,
        config.show_directory
    );

    let state = AppState::from_config(&config);
    let cache = state.cache.clone();
    info!("File cache initialized");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cache))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, stops the decay timer and allows graceful shutdown.
async fn shutdown_signal(cache: FileCache) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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

    cache.stop_decay();
    warn!("Decay timer stopped");

    match serde_json::to_string(&cache.stats().await) {
        Ok(stats) => info!("Final cache stats: {}", stats),
        Err(err) => warn!("Failed to encode cache stats: {}", err),
    }
}
