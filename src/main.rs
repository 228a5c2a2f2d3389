//! Feed Cache server
//!
//! Loads the read-path caches from the backing store and serves the feed.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_cache::api::{create_router, AppState};
use feed_cache::images::ImageStore;
use feed_cache::store::{BackingStore, MemoryStore, Seed};
use feed_cache::{CacheLoader, Config};

/// Main entry point for the feed server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the backing store, optionally from a seed file
/// 4. Fill the caches; any load error aborts startup
/// 5. Create Axum router and serve until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feed_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Feed Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, seed={:?}",
        config.server_port, config.seed_path
    );

    let store: Arc<dyn BackingStore> = Arc::new(open_store(&config).await?);

    let images = ImageStore::new(&config.image_dir);
    info!("Image directory: {}", images.root().display());
    let (caches, report) = CacheLoader::new(store.clone(), images.clone())
        .load()
        .await
        .context("failed to load caches")?;
    info!(
        "Caches loaded: {} posts ({} images written), {} users",
        report.posts, report.images_written, report.users
    );

    let state = AppState::new(store, caches, images);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<MemoryStore> {
    let Some(path) = &config.seed_path else {
        info!("No seed file configured, starting with an empty store");
        return Ok(MemoryStore::new());
    };

    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let seed: Seed = serde_json::from_slice(&raw)
        .with_context(|| format!("invalid seed file {}", path.display()))?;
    let store = MemoryStore::from_seed(seed).context("seed data is inconsistent")?;
    info!("Store seeded from {}", path.display());
    Ok(store)
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
