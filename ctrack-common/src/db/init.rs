//! Database initialization
//!
//! Opens (or creates) the SQLite database in the root folder and creates the tables the
//! services need. Table creation is idempotent and runs on every startup.

use crate::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// How long a connection waits on a locked database before failing
pub const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// Per-connection options for the on-disk database
///
/// Applied to every pooled connection as it is opened. WAL lets the record query endpoint
/// read while a refresh is writing.
pub fn connect_options(db_path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
}

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(connect_options(db_path))
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Open a single-connection in-memory database with the schema applied
///
/// One connection only: every SQLite `:memory:` connection is a separate database.
pub async fn init_in_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// Create every table (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_unified_records_table(pool).await?;
    Ok(())
}

pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_unified_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS unified_records (
            date TEXT NOT NULL,
            location TEXT NOT NULL,
            new_positive_tests INTEGER,
            total_positive_tests INTEGER,
            current_hospitalizations INTEGER,
            positive_test_rate REAL,
            total_people_vaccinated INTEGER,
            new_people_vaccinated INTEGER,
            positive_test_rate_trailing_avg REAL,
            new_vaccinations_trailing_avg REAL,
            PRIMARY KEY (location, date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
