//! ctrack-ingest - pandemic statistics ingestion service
//!
//! Refreshes the unified dataset on startup when it is stale (and optionally on a fixed
//! interval), then serves it over HTTP until shut down.

use anyhow::{Context, Result};
use clap::Parser;
use ctrack_common::config::{load_config, prepare_root_folder, resolve_root_folder};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ctrack_ingest::db::{settings, SqliteRecordStore};
use ctrack_ingest::services::Reconciler;
use ctrack_ingest::sources::HttpFeedSource;
use ctrack_ingest::{logging, AppState};

#[derive(Parser, Debug)]
#[command(name = "ctrack-ingest")]
#[command(about = "Pandemic statistics ingestion and reconciliation service")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long, env = "CTRACK_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Path to ctrack.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides [server] bind)
    #[arg(short, long, env = "CTRACK_BIND")]
    bind: Option<String>,

    /// Run one reconciliation cycle and exit (non-zero status on failure)
    #[arg(long)]
    refresh_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter_handle = logging::init();
    let config = load_config(args.config.as_deref());
    if let Some(handle) = &filter_handle {
        logging::apply_level(handle, &config.logging.level)
            .context("Failed to apply configured log level")?;
    }

    info!("Starting ctrack-ingest v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = prepare_root_folder(&root_folder)
        .with_context(|| format!("Failed to initialize root folder {}", root_folder.display()))?;
    info!("Database: {}", db_path.display());

    let db = ctrack_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let max_lock_wait_ms = settings::get_max_lock_wait_ms(&db).await?;
    let store = Arc::new(SqliteRecordStore::new(db.clone()).with_max_lock_wait_ms(max_lock_wait_ms));

    let source = HttpFeedSource::new(
        config.sources.clone(),
        Duration::from_secs(config.refresh.http_timeout_secs),
    )
    .context("Failed to build HTTP client")?;

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(source),
        store.clone(),
        db.clone(),
        config.sources.base_format,
    ));

    if args.refresh_once {
        let report = reconciler
            .refresh()
            .await
            .context("Reconciliation cycle failed")?;
        info!(
            records_written = report.records_written,
            locations = report.locations,
            "Refresh complete"
        );
        return Ok(());
    }

    let max_age = chrono::Duration::hours(config.refresh.on_startup_if_older_than_hours as i64);
    let startup_reconciler = reconciler.clone();
    let startup_refresh = tokio::spawn(async move {
        match startup_reconciler.refresh_if_stale(max_age).await {
            Ok(Some(report)) => info!(
                records_written = report.records_written,
                "Startup refresh complete"
            ),
            Ok(None) => {}
            Err(e) => warn!("Startup refresh failed: {}", e),
        }
    });

    let cancel_token = CancellationToken::new();
    let periodic = match config.refresh.interval_minutes.filter(|m| *m > 0) {
        Some(minutes) => Some(tokio::spawn(
            reconciler
                .clone()
                .run_periodic(Duration::from_secs(minutes * 60), cancel_token.clone()),
        )),
        None => None,
    };

    let state = AppState::new(db, store, reconciler);
    let app = ctrack_ingest::build_router(state);

    let bind = args.bind.unwrap_or(config.server.bind);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel_token.cancel();
    if let Err(e) = startup_refresh.await {
        error!("Startup refresh task ended abnormally: {}", e);
    }
    if let Some(handle) = periodic {
        if let Err(e) = handle.await {
            error!("Periodic refresh task ended abnormally: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install terminate handler: {}", e);
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
