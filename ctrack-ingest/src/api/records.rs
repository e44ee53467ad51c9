//! Record query API
//!
//! GET /records/{code}?after=YYYY-MM-DD or ?days=N, GET /locations

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use ctrack_common::{time, Location, UnifiedRecord};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Days of history returned when neither `after` nor `days` is given
pub const DEFAULT_DAYS: i64 = time::THREE_MONTHS_DAYS;

/// GET /records query parameters
///
/// `after` (inclusive) takes precedence over `days`.
#[derive(Debug, Default, Deserialize)]
pub struct RecordQuery {
    pub after: Option<String>,
    pub days: Option<i64>,
}

impl RecordQuery {
    /// Earliest date to return
    pub fn since(&self) -> ApiResult<NaiveDate> {
        if let Some(after) = &self.after {
            return time::parse_feed_date(after).ok_or_else(|| {
                ApiError::BadRequest(format!("Invalid date (expected YYYY-MM-DD): {}", after))
            });
        }

        match self.days {
            Some(days) if days < 0 => Err(ApiError::BadRequest(format!(
                "days must not be negative: {}",
                days
            ))),
            Some(days) => Ok(time::days_ago(days)),
            None => Ok(time::days_ago(DEFAULT_DAYS)),
        }
    }
}

/// One entry of GET /locations
#[derive(Debug, Serialize)]
pub struct LocationEntry {
    pub code: &'static str,
    pub name: &'static str,
    pub country: bool,
}

/// GET /records/{code}
pub async fn get_records(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<RecordQuery>,
) -> ApiResult<Json<Vec<UnifiedRecord>>> {
    let location = Location::from_code(&code.to_ascii_uppercase())
        .ok_or_else(|| ApiError::NotFound(format!("Unknown location: {}", code)))?;
    let since = query.since()?;

    let records = state.store.records_for_location(location, since).await?;

    tracing::debug!(
        location = %location,
        since = %since,
        records = records.len(),
        "Served records"
    );

    Ok(Json(records))
}

/// GET /locations
pub async fn list_locations() -> Json<Vec<LocationEntry>> {
    Json(
        Location::all()
            .iter()
            .map(|l| LocationEntry {
                code: l.code(),
                name: l.name(),
                country: l.is_country(),
            })
            .collect(),
    )
}

pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/records/:code", get(get_records))
        .route("/locations", get(list_locations))
}
