//! Unified record persistence
//!
//! The `unified_records` table holds exactly one generation of the dataset: every successful
//! reconciliation cycle replaces it wholesale. Readers only ever see the previous generation
//! or the new one, never a mix.

use async_trait::async_trait;
use chrono::NaiveDate;
use ctrack_common::{time, Error, Location, Result, UnifiedRecord};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Persistence gateway for unified records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Remove every stored record
    async fn clear_all(&self) -> Result<()>;

    /// Store records, replacing any already stored under the same (location, date)
    ///
    /// Returns how many rows were added; rows that overwrote an existing key are not counted.
    async fn insert(&self, records: &[UnifiedRecord]) -> Result<usize>;

    /// Swap the stored dataset for `records`
    ///
    /// Either the whole new dataset is visible afterwards or, on error, the previous one is.
    /// Returns the number of rows stored, so repeated (location, date) keys count once.
    async fn replace_all(&self, records: &[UnifiedRecord]) -> Result<usize>;

    /// Records of one location dated on or after `since`, oldest first
    async fn records_for_location(
        &self,
        location: Location,
        since: NaiveDate,
    ) -> Result<Vec<UnifiedRecord>>;

    /// Number of stored records
    async fn count(&self) -> Result<i64>;
}

/// SQLite-backed record store
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    pub fn with_max_lock_wait_ms(mut self, max_lock_wait_ms: u64) -> Self {
        self.max_lock_wait_ms = max_lock_wait_ms;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn replace_in_transaction(&self, records: &[UnifiedRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM unified_records")
            .execute(&mut *tx)
            .await?;
        insert_rows(&mut tx, records).await?;
        let stored = count_rows(&mut tx).await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn insert_in_transaction(&self, records: &[UnifiedRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let before = count_rows(&mut tx).await?;
        insert_rows(&mut tx, records).await?;
        let after = count_rows(&mut tx).await?;
        tx.commit().await?;
        Ok(after.saturating_sub(before))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn clear_all(&self) -> Result<()> {
        let pool = &self.pool;
        retry_on_lock("clear unified records", self.max_lock_wait_ms, || async move {
            sqlx::query("DELETE FROM unified_records")
                .execute(pool)
                .await?;
            Ok(())
        })
        .await?;

        debug!("Cleared unified records");
        Ok(())
    }

    async fn insert(&self, records: &[UnifiedRecord]) -> Result<usize> {
        let written = retry_on_lock("insert unified records", self.max_lock_wait_ms, || {
            self.insert_in_transaction(records)
        })
        .await?;

        debug!(written, "Inserted unified records");
        Ok(written)
    }

    async fn replace_all(&self, records: &[UnifiedRecord]) -> Result<usize> {
        let written = retry_on_lock("replace unified records", self.max_lock_wait_ms, || {
            self.replace_in_transaction(records)
        })
        .await?;

        info!(written, "Replaced unified record dataset");
        Ok(written)
    }

    async fn records_for_location(
        &self,
        location: Location,
        since: NaiveDate,
    ) -> Result<Vec<UnifiedRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT date, location, new_positive_tests, total_positive_tests,
                   current_hospitalizations, positive_test_rate, total_people_vaccinated,
                   new_people_vaccinated, positive_test_rate_trailing_avg,
                   new_vaccinations_trailing_avg
            FROM unified_records
            WHERE location = ? AND date >= ?
            ORDER BY date ASC
            "#,
        )
        .bind(location.code())
        .bind(format_date(since))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM unified_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn count_rows(conn: &mut SqliteConnection) -> Result<usize> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM unified_records")
        .fetch_one(&mut *conn)
        .await?;
    Ok(count as usize)
}

async fn insert_rows(conn: &mut SqliteConnection, records: &[UnifiedRecord]) -> Result<()> {
    for record in records {
        sqlx::query(
            r#"
            INSERT INTO unified_records (
                date, location, new_positive_tests, total_positive_tests,
                current_hospitalizations, positive_test_rate, total_people_vaccinated,
                new_people_vaccinated, positive_test_rate_trailing_avg,
                new_vaccinations_trailing_avg
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(location, date) DO UPDATE SET
                new_positive_tests = excluded.new_positive_tests,
                total_positive_tests = excluded.total_positive_tests,
                current_hospitalizations = excluded.current_hospitalizations,
                positive_test_rate = excluded.positive_test_rate,
                total_people_vaccinated = excluded.total_people_vaccinated,
                new_people_vaccinated = excluded.new_people_vaccinated,
                positive_test_rate_trailing_avg = excluded.positive_test_rate_trailing_avg,
                new_vaccinations_trailing_avg = excluded.new_vaccinations_trailing_avg
            "#,
        )
        .bind(format_date(record.date))
        .bind(record.location.code())
        .bind(record.new_positive_tests)
        .bind(record.total_positive_tests)
        .bind(record.current_hospitalizations)
        .bind(record.positive_test_rate)
        .bind(record.total_people_vaccinated)
        .bind(record.new_people_vaccinated)
        .bind(record.positive_test_rate_trailing_avg)
        .bind(record.new_vaccinations_trailing_avg)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

fn format_date(date: NaiveDate) -> String {
    date.format(time::FEED_DATE_FORMAT).to_string()
}

fn record_from_row(row: &SqliteRow) -> Result<UnifiedRecord> {
    let date: String = row.try_get("date")?;
    let code: String = row.try_get("location")?;

    let date = time::parse_feed_date(&date)
        .ok_or_else(|| Error::Internal(format!("Stored record has invalid date: {}", date)))?;
    let location = Location::from_code(&code)
        .ok_or_else(|| Error::Internal(format!("Stored record has unknown location: {}", code)))?;

    Ok(UnifiedRecord {
        date,
        location,
        new_positive_tests: row.try_get("new_positive_tests")?,
        total_positive_tests: row.try_get("total_positive_tests")?,
        current_hospitalizations: row.try_get("current_hospitalizations")?,
        positive_test_rate: row.try_get("positive_test_rate")?,
        total_people_vaccinated: row.try_get("total_people_vaccinated")?,
        new_people_vaccinated: row.try_get("new_people_vaccinated")?,
        positive_test_rate_trailing_avg: row.try_get("positive_test_rate_trailing_avg")?,
        new_vaccinations_trailing_avg: row.try_get("new_vaccinations_trailing_avg")?,
    })
}
