//! Test Helper Utilities
//!
//! Fake feed sources and canned feed bodies shared by the ctrack-ingest integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use ctrack_common::config::BaseFeedFormat;
use ctrack_common::{Error, Location, Result, UnifiedRecord};
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use ctrack_ingest::db::{RecordStore, SqliteRecordStore};
use ctrack_ingest::services::Reconciler;
use ctrack_ingest::sources::{Feed, FeedSource, FetchError};

/// Days of data in the canned feeds (2021-01-01 onward)
pub const DAYS: u32 = 8;

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
}

/// State daily feed: Ohio and New York, 10 positives out of 100 tests every day
pub fn state_daily_json() -> String {
    let mut entries = Vec::new();
    for d in 1..=DAYS {
        for code in ["OH", "NY"] {
            entries.push(json!({
                "date": 20210100 + d as i64,
                "state": code,
                "positiveIncrease": 10,
                "positive": 10 * d as i64,
                "hospitalizedCurrently": 5,
                "totalTestResultsIncrease": 100,
            }));
        }
    }
    serde_json::to_string(&entries).unwrap()
}

/// Country daily feed: 100 positives out of 1000 tests every day
pub fn country_daily_json() -> String {
    let entries: Vec<_> = (1..=DAYS)
        .map(|d| {
            json!({
                "date": 20210100 + d as i64,
                "positiveIncrease": 100,
                "positive": 100 * d as i64,
                "totalTestResultsIncrease": 1000,
            })
        })
        .collect();
    serde_json::to_string(&entries).unwrap()
}

/// Country vaccinations: 100 more people every day
pub fn country_vaccinations_csv() -> String {
    let mut csv = String::from("location,date,vaccine,people_vaccinated\n");
    for d in 1..=DAYS {
        csv.push_str(&format!(
            "United States,2021-01-{:02},\"Moderna, Pfizer/BioNTech\",{}\n",
            d,
            100 * d
        ));
    }
    csv
}

/// State vaccinations: 50 more people per state every day
pub fn state_vaccinations_csv() -> String {
    let mut csv = String::from("date,location,total_vaccinations,people_vaccinated\n");
    for d in 1..=DAYS {
        csv.push_str(&format!("2021-01-{:02},Ohio,,{}\n", d, 50 * d));
        csv.push_str(&format!("2021-01-{:02},\"New York State\",,{}\n", d, 50 * d));
    }
    csv
}

/// Feed source serving canned bodies
pub struct FakeFeedSource {
    payloads: HashMap<Feed, String>,
    failing: HashSet<Feed>,
    release: Option<CancellationToken>,
    calls: AtomicUsize,
}

impl FakeFeedSource {
    /// Source serving the standard canned feeds
    pub fn standard() -> Self {
        let payloads = HashMap::from([
            (Feed::StateDaily, state_daily_json()),
            (Feed::CountryDaily, country_daily_json()),
            (Feed::CountryVaccinations, country_vaccinations_csv()),
            (Feed::StateVaccinations, state_vaccinations_csv()),
        ]);
        Self {
            payloads,
            failing: HashSet::new(),
            release: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_payload(mut self, feed: Feed, body: impl Into<String>) -> Self {
        self.payloads.insert(feed, body.into());
        self
    }

    pub fn failing(mut self, feed: Feed) -> Self {
        self.failing.insert(feed);
        self
    }

    /// Hold every fetch until `release` is cancelled
    pub fn gated(mut self, release: CancellationToken) -> Self {
        self.release = Some(release);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for FakeFeedSource {
    async fn fetch(&self, feed: Feed) -> std::result::Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(release) = &self.release {
            release.cancelled().await;
        }

        if self.failing.contains(&feed) {
            return Err(FetchError::Status(503, "Service Unavailable".to_string()));
        }

        self.payloads
            .get(&feed)
            .cloned()
            .ok_or_else(|| FetchError::Unconfigured(feed.name().to_string()))
    }
}

/// Record store whose writes always fail
pub struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    async fn clear_all(&self) -> Result<()> {
        Err(Error::Internal("disk full".to_string()))
    }

    async fn insert(&self, _records: &[UnifiedRecord]) -> Result<usize> {
        Err(Error::Internal("disk full".to_string()))
    }

    async fn replace_all(&self, _records: &[UnifiedRecord]) -> Result<usize> {
        Err(Error::Internal("disk full".to_string()))
    }

    async fn records_for_location(
        &self,
        _location: Location,
        _since: NaiveDate,
    ) -> Result<Vec<UnifiedRecord>> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<i64> {
        Ok(0)
    }
}

/// In-memory database, SQLite store and reconciler wired to `source`
pub async fn create_test_reconciler(
    source: Arc<FakeFeedSource>,
) -> (Arc<Reconciler>, Arc<SqliteRecordStore>, SqlitePool) {
    let pool = ctrack_common::db::init_in_memory_database()
        .await
        .expect("Failed to create in-memory database");
    let store = Arc::new(SqliteRecordStore::new(pool.clone()));
    let reconciler = Arc::new(Reconciler::new(
        source,
        store.clone(),
        pool.clone(),
        BaseFeedFormat::Json,
    ));
    (reconciler, store, pool)
}

/// Wait until a cycle holds the single-flight guard
pub async fn wait_until_running(reconciler: &Reconciler) {
    for _ in 0..200 {
        if reconciler.is_running() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("reconciliation cycle never started");
}
