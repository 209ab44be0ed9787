//! fa-resolver - file annotation resolution service
//!
//! Serves file annotations as display HTML. Annotations that are a lone
//! link to a Commons category, a Wikipedia article or a Wikidata item are
//! replaced by a cached preview of the linked resource.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fa_common::config::{CacheBackend, LogFormat, LoggingConfig, RootFolderInitializer, RootFolderResolver};
use fa_common::time::{Clock, SystemClock};
use fa_resolver::cache::SqliteCacheStore;
use fa_resolver::clients::ApiClient;
use fa_resolver::config::{effective_config, Args};
use fa_resolver::db::SqliteAnnotationStore;
use fa_resolver::markup::ParseApiRenderer;
use fa_resolver::watermarks::MemoryWatermarks;
use fa_resolver::{build_router, open_cache_store, AppState, Collaborators};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Interval between sweeps of expired rows in the SQLite cache
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = effective_config(&args).context("Failed to load configuration")?;

    init_tracing(&config.logging)?;

    // Build identification first, before any slow startup work
    info!(
        "Starting FileAnnotations resolver (fa-resolver) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = config
        .root_folder
        .clone()
        .unwrap_or_else(|| RootFolderResolver::default().resolve());
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let pool = fa_resolver::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let cache_store = open_cache_store(&config.cache, &pool, Arc::clone(&clock)).await?;
    info!("Cache backend: {}", cache_store.name());

    if config.cache.backend == CacheBackend::Sqlite {
        spawn_cache_sweeper(SqliteCacheStore::new(pool.clone()), Arc::clone(&clock));
    }

    let api = Arc::new(
        ApiClient::new(&config.http).map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?,
    );
    let renderer = Arc::new(ParseApiRenderer::new(
        Arc::clone(&api),
        config.endpoints.render_api.clone(),
    ));

    let state = AppState::assemble(
        &config,
        api,
        Collaborators {
            store: Arc::new(SqliteAnnotationStore::new(pool.clone())),
            cache_store,
            renderer,
            watermarks: Arc::new(MemoryWatermarks::new()),
            clock,
        },
    );
    let app = build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Install the global subscriber
///
/// RUST_LOG, when set, overrides `logging.level`.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let writer = match &logging.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(logging.file.is_none());

    match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

/// Periodically remove cache rows past their stale window
fn spawn_cache_sweeper(store: SqliteCacheStore, clock: Arc<dyn Clock>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = store.purge_expired(clock.now()).await {
                warn!("Cache sweep failed: {}", e);
            }
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
