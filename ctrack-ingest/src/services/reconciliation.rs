//! Reconciliation Pipeline
//!
//! One cycle runs fetch → adapt → merge → average → persist as a single unit of work:
//!
//! 1. **Fetch:** all four feeds concurrently. Any failure aborts the cycle before anything is
//!    written, so the stored dataset is left untouched.
//! 2. **Adapt:** daily case payloads become unified records (bad rows dropped and counted).
//! 3. **Merge:** vaccination counts joined on per scope (country, then states), concatenated.
//! 4. **Average:** trailing averages over the whole set.
//! 5. **Persist:** stored dataset swapped for the new one in one transaction.
//!
//! At most one cycle runs at a time; a cycle requested while another is in flight fails with
//! [`ReconcileError::AlreadyRunning`] instead of queueing.

use chrono::{DateTime, Utc};
use ctrack_common::config::BaseFeedFormat;
use ctrack_common::{time, UnifiedRecord};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::db::settings;
use crate::db::RecordStore;
use crate::services::rolling_average::calculate_trailing_averages;
use crate::services::vaccination_merger::merge_vaccinations;
use crate::sources::{adapt_base, Feed, FeedPayloads, FeedSource, FetchError, Scope};

/// Why a cycle failed
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Feed {feed} unavailable: {source}")]
    SourceUnavailable {
        feed: Feed,
        #[source]
        source: FetchError,
    },

    #[error("Persistence failed: {0}")]
    Persistence(#[from] ctrack_common::Error),

    #[error("A reconciliation cycle is already running")]
    AlreadyRunning,
}

/// Summary of a successful cycle
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RefreshReport {
    pub records_written: usize,
    pub locations: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs reconciliation cycles against a feed source and a record store
pub struct Reconciler {
    source: Arc<dyn FeedSource>,
    store: Arc<dyn RecordStore>,
    db: SqlitePool,
    base_format: BaseFeedFormat,
    in_flight: Mutex<()>,
    last_error: Arc<RwLock<Option<String>>>,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn FeedSource>,
        store: Arc<dyn RecordStore>,
        db: SqlitePool,
        base_format: BaseFeedFormat,
    ) -> Self {
        Self {
            source,
            store,
            db,
            base_format,
            in_flight: Mutex::new(()),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Shared handle to the message of the most recent failed cycle
    ///
    /// Cleared by the next successful cycle.
    pub fn last_error_handle(&self) -> Arc<RwLock<Option<String>>> {
        self.last_error.clone()
    }

    /// Whether a cycle is currently in flight
    pub fn is_running(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Run one full cycle
    pub async fn run_cycle(&self) -> Result<RefreshReport, ReconcileError> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| ReconcileError::AlreadyRunning)?;

        let started_at = time::now();
        let timer = Instant::now();
        info!(base_format = ?self.base_format, "Starting reconciliation cycle");

        let payloads = self.fetch_all().await?;
        let records = build_dataset(&payloads, self.base_format)?;
        let locations = records
            .iter()
            .map(|r| r.location)
            .collect::<HashSet<_>>()
            .len();

        let records_written = self.store.replace_all(&records).await?;
        let finished_at = time::now();
        // Dataset already committed: the cycle has succeeded
        if let Err(e) = settings::set_last_refreshed_at(&self.db, finished_at).await {
            warn!("Failed to record refresh time: {}", e);
        }

        info!(
            records_written,
            locations,
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "Reconciliation cycle complete"
        );

        Ok(RefreshReport {
            records_written,
            locations,
            started_at,
            finished_at,
        })
    }

    /// Run one cycle and collapse the outcome to success or failure
    ///
    /// Failures are logged and remembered for the health endpoint.
    pub async fn refresh_now(&self) -> bool {
        self.refresh().await.is_ok()
    }

    /// Run one cycle, recording the outcome
    pub async fn refresh(&self) -> Result<RefreshReport, ReconcileError> {
        match self.run_cycle().await {
            Ok(report) => {
                *self.last_error.write().await = None;
                Ok(report)
            }
            Err(ReconcileError::AlreadyRunning) => {
                warn!("Refresh requested while a cycle is in flight");
                Err(ReconcileError::AlreadyRunning)
            }
            Err(e) => {
                error!("Reconciliation cycle failed: {}", e);
                *self.last_error.write().await = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Run a cycle unless the last successful one finished less than `max_age` ago
    ///
    /// Returns `Ok(None)` when the stored dataset is fresh enough.
    pub async fn refresh_if_stale(
        &self,
        max_age: chrono::Duration,
    ) -> Result<Option<RefreshReport>, ReconcileError> {
        if let Some(last) = settings::get_last_refreshed_at(&self.db).await? {
            let age = time::now() - last;
            if age < max_age {
                info!(
                    last_refreshed_at = %last.to_rfc3339(),
                    "Stored dataset is fresh; skipping refresh"
                );
                return Ok(None);
            }
        }

        self.refresh().await.map(Some)
    }

    /// Refresh every `period` until `cancel_token` fires
    ///
    /// The first cycle runs one full period after the call.
    pub async fn run_periodic(self: Arc<Self>, period: Duration, cancel_token: CancellationToken) {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(period_secs = period.as_secs(), "Periodic refresh started");

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Periodic refresh stopped");
                    break;
                }
                _ = interval.tick() => {
                    let ok = self.refresh_now().await;
                    debug!(success = ok, "Periodic refresh finished");
                }
            }
        }
    }

    async fn fetch_all(&self) -> Result<FeedPayloads, ReconcileError> {
        let timer = Instant::now();

        let (state_daily, country_daily, country_vaccinations, state_vaccinations) =
            futures::future::try_join4(
                self.fetch(Feed::StateDaily),
                self.fetch(Feed::CountryDaily),
                self.fetch(Feed::CountryVaccinations),
                self.fetch(Feed::StateVaccinations),
            )
            .await?;

        info!(
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "Fetched all feeds"
        );

        Ok(FeedPayloads {
            state_daily,
            country_daily,
            country_vaccinations,
            state_vaccinations,
        })
    }

    async fn fetch(&self, feed: Feed) -> Result<String, ReconcileError> {
        self.source.fetch(feed).await.map_err(|source| {
            warn!(%feed, "Feed fetch failed: {}", source);
            ReconcileError::SourceUnavailable { feed, source }
        })
    }
}

/// Build the final dataset of one cycle from the raw feed bodies
///
/// Country records come first, then state records, each in feed order.
pub fn build_dataset(
    payloads: &FeedPayloads,
    base_format: BaseFeedFormat,
) -> Result<Vec<UnifiedRecord>, ReconcileError> {
    let country = adapt_base(&payloads.country_daily, base_format, Scope::Country)
        .map_err(|source| ReconcileError::SourceUnavailable {
            feed: Feed::CountryDaily,
            source,
        })?;
    let states = adapt_base(&payloads.state_daily, base_format, Scope::Regional)
        .map_err(|source| ReconcileError::SourceUnavailable {
            feed: Feed::StateDaily,
            source,
        })?;

    if country.dropped + states.dropped > 0 {
        warn!(
            country_dropped = country.dropped,
            state_dropped = states.dropped,
            "Dropped unreadable daily records"
        );
    }

    let country = merge_vaccinations(&payloads.country_vaccinations, country.records, Scope::Country);
    let states = merge_vaccinations(&payloads.state_vaccinations, states.records, Scope::Regional);

    let mut records = country.records;
    records.extend(states.records);

    Ok(calculate_trailing_averages(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrack_common::Location;

    fn payloads() -> FeedPayloads {
        FeedPayloads {
            state_daily: r#"[
                {"date": 20210102, "state": "OH", "positiveIncrease": 20, "totalTestResultsIncrease": 200},
                {"date": 20210101, "state": "OH", "positiveIncrease": 10, "totalTestResultsIncrease": 100}
            ]"#
            .to_string(),
            country_daily: r#"[{"date": 20210101, "positiveIncrease": 500}]"#.to_string(),
            country_vaccinations: "location,date,people_vaccinated\nUnited States,2021-01-01,900\n"
                .to_string(),
            state_vaccinations: "date,location,people_vaccinated\n2021-01-01,Ohio,30\n2021-01-02,Ohio,45\n"
                .to_string(),
        }
    }

    #[test]
    fn test_build_dataset_country_first_then_states() {
        let records = build_dataset(&payloads(), BaseFeedFormat::Json).unwrap();

        let keys: Vec<Location> = records.iter().map(|r| r.location).collect();
        assert_eq!(keys, vec![Location::COUNTRY, Location::Ohio, Location::Ohio]);

        assert_eq!(records[0].total_people_vaccinated, Some(900));
        // Feed order kept: 2021-01-02 first
        assert_eq!(records[1].new_people_vaccinated, Some(15));
        assert_eq!(records[2].new_people_vaccinated, Some(30));
    }

    #[test]
    fn test_build_dataset_rejects_non_list_structured_payload() {
        let mut bad = payloads();
        bad.state_daily = r#"{"error": "rate limited"}"#.to_string();

        let err = build_dataset(&bad, BaseFeedFormat::Json).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::SourceUnavailable { feed: Feed::StateDaily, .. }
        ));
    }

    #[test]
    fn test_build_dataset_from_delimited_base_feeds() {
        let mut csv = payloads();
        csv.state_daily = "date,state,positiveIncrease\n20210101,OH,10\n".to_string();
        csv.country_daily = "date,positiveIncrease\n20210101,500\n".to_string();

        let records = build_dataset(&csv, BaseFeedFormat::Csv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].total_people_vaccinated, Some(30));
    }
}
