//! ctrack-ingest library interface
//!
//! Fetches the daily case and vaccination feeds, reconciles them into one unified record per
//! location and day, and serves the stored dataset over HTTP.

pub mod api;
pub mod db;
pub mod error;
pub mod logging;
pub mod services;
pub mod sources;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::db::RecordStore;
use crate::services::Reconciler;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Read side of the persisted dataset
    pub store: Arc<dyn RecordStore>,
    pub reconciler: Arc<Reconciler>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Message of the last failed cycle, shared with the reconciler
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, store: Arc<dyn RecordStore>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            db,
            store,
            last_error: reconciler.last_error_handle(),
            reconciler,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::refresh_routes())
        .merge(api::record_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
