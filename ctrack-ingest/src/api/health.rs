//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::settings;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the last cycle failed
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Finish time of the last successful cycle
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub refresh_in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_error = state.last_error.read().await.clone();

    // A corrupt timestamp is reported as never refreshed rather than failing the health check
    let last_refreshed_at = match settings::get_last_refreshed_at(&state.db).await {
        Ok(at) => at,
        Err(e) => {
            tracing::warn!("Failed to read last refresh time: {}", e);
            None
        }
    };

    let status = if last_error.is_some() { "degraded" } else { "ok" };

    Json(HealthResponse {
        status: status.to_string(),
        module: "ctrack-ingest".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        last_refreshed_at,
        refresh_in_progress: state.reconciler.is_running(),
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
