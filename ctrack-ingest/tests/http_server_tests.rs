//! Integration tests for the ctrack-ingest HTTP API

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use ctrack_common::Location;
use ctrack_ingest::{build_router, AppState};
use helpers::{create_test_reconciler, FakeFeedSource, DAYS};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;

async fn create_test_app(source: FakeFeedSource) -> (Router, AppState) {
    let (reconciler, store, pool) = create_test_reconciler(Arc::new(source)).await;
    let state = AppState::new(pool, store, reconciler);
    (build_router(state.clone()), state)
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _state) = create_test_app(FakeFeedSource::standard()).await;

    let (status, json) = send(app, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "ctrack-ingest");
    assert!(json["last_refreshed_at"].is_null());
    assert_eq!(json["refresh_in_progress"], false);
    assert!(json.get("last_error").is_none());
}

#[tokio::test]
async fn test_refresh_endpoint_success() {
    let (app, _state) = create_test_app(FakeFeedSource::standard()).await;

    let (status, json) = send(app.clone(), "POST", "/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["records_written"], 3 * DAYS as u64);

    let (_, health) = send(app, "GET", "/health").await;
    assert!(health["last_refreshed_at"].is_string());
}

#[tokio::test]
async fn test_refresh_endpoint_failure_is_reported() {
    let source = FakeFeedSource::standard().failing(ctrack_ingest::sources::Feed::CountryDaily);
    let (app, _state) = create_test_app(source).await;

    let (status, json) = send(app.clone(), "POST", "/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert_eq!(json["records_written"], 0);
    assert!(json["error"].as_str().unwrap().contains("country_daily"));

    let (_, health) = send(app, "GET", "/health").await;
    assert_eq!(health["status"], "degraded");
    assert!(health["last_error"].is_string());
}

#[tokio::test]
async fn test_refresh_endpoint_conflict_while_running() {
    let release = CancellationToken::new();
    let (app, state) = create_test_app(FakeFeedSource::standard().gated(release.clone())).await;

    let in_flight = tokio::spawn(send(app.clone(), "POST", "/refresh"));
    helpers::wait_until_running(&state.reconciler).await;

    let (status, json) = send(app.clone(), "POST", "/refresh").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "CONFLICT");

    release.cancel();
    let (status, json) = in_flight.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
}

#[tokio::test]
async fn test_refresh_completes_after_client_goes_away() {
    let release = CancellationToken::new();
    let (app, state) = create_test_app(FakeFeedSource::standard().gated(release.clone())).await;

    let request = tokio::spawn(send(app, "POST", "/refresh"));
    helpers::wait_until_running(&state.reconciler).await;

    // Dropping the request future mirrors a closed connection
    request.abort();
    assert!(request.await.unwrap_err().is_cancelled());
    release.cancel();

    for _ in 0..200 {
        if !state.reconciler.is_running() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert!(!state.reconciler.is_running());
    assert_eq!(state.store.count().await.unwrap(), 3 * DAYS as i64);
}

#[tokio::test]
async fn test_records_endpoint_returns_ordered_records() {
    let (app, state) = create_test_app(FakeFeedSource::standard()).await;
    assert!(state.reconciler.refresh_now().await);

    let (status, json) = send(app, "GET", "/records/oh?after=2021-01-03").await;

    assert_eq!(status, StatusCode::OK);
    let records = json.as_array().unwrap();
    assert_eq!(records.len(), DAYS as usize - 2);
    assert_eq!(records[0]["date"], "2021-01-03");
    assert_eq!(records[0]["location"], "OH");
    assert_eq!(records.last().unwrap()["date"], "2021-01-08");
    assert!(records[4]["positive_test_rate_trailing_avg"].is_f64());
}

#[tokio::test]
async fn test_records_endpoint_default_window_excludes_old_data() {
    let (app, state) = create_test_app(FakeFeedSource::standard()).await;
    assert!(state.reconciler.refresh_now().await);

    let (status, json) = send(app, "GET", "/records/US").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_records_endpoint_unknown_location() {
    let (app, _state) = create_test_app(FakeFeedSource::standard()).await;

    let (status, json) = send(app, "GET", "/records/ZZ").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_records_endpoint_bad_date() {
    let (app, _state) = create_test_app(FakeFeedSource::standard()).await;

    let (status, json) = send(app, "GET", "/records/OH?after=January").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_locations_endpoint() {
    let (app, _state) = create_test_app(FakeFeedSource::standard()).await;

    let (status, json) = send(app, "GET", "/locations").await;

    assert_eq!(status, StatusCode::OK);
    let locations = json.as_array().unwrap();
    assert_eq!(locations.len(), Location::all().len());
    assert_eq!(locations[0]["code"], Location::COUNTRY.code());
    assert_eq!(locations[0]["country"], true);
    assert!(locations
        .iter()
        .any(|l| l["code"] == "PR" && l["name"] == "Puerto Rico"));
}
