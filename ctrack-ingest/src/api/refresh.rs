//! Manual refresh trigger
//!
//! POST /refresh runs one reconciliation cycle and answers when it is done.

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::services::ReconcileError;
use crate::AppState;

/// POST /refresh response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub records_written: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /refresh
///
/// A failed cycle is still a 200 with `success: false`; only a cycle that is already in
/// flight is rejected (409). The cycle runs on its own task and finishes its write even if
/// the client goes away.
pub async fn trigger_refresh(State(state): State<AppState>) -> ApiResult<Json<RefreshResponse>> {
    let reconciler = state.reconciler.clone();
    let outcome = tokio::spawn(async move { reconciler.refresh().await })
        .await
        .map_err(|e| ApiError::Internal(format!("Refresh task failed: {}", e)))?;

    match outcome {
        Ok(report) => Ok(Json(RefreshResponse {
            success: true,
            records_written: report.records_written,
            error: None,
        })),
        Err(ReconcileError::AlreadyRunning) => Err(ApiError::from(ReconcileError::AlreadyRunning)),
        Err(e) => Ok(Json(RefreshResponse {
            success: false,
            records_written: 0,
            error: Some(e.to_string()),
        })),
    }
}

pub fn refresh_routes() -> Router<AppState> {
    Router::new().route("/refresh", post(trigger_refresh))
}
