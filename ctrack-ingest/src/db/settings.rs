//! Settings table accessors
//!
//! Key-value rows in the `settings` table.

use chrono::{DateTime, Utc};
use ctrack_common::{Error, Result};
use sqlx::SqlitePool;

use crate::utils::DEFAULT_MAX_LOCK_WAIT_MS;

pub const LAST_REFRESHED_AT_KEY: &str = "last_refreshed_at";
pub const MAX_LOCK_WAIT_MS_KEY: &str = "database_max_lock_wait_ms";

/// Read a setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

/// Insert or replace a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Time of the last successful reconciliation cycle
pub async fn get_last_refreshed_at(pool: &SqlitePool) -> Result<Option<DateTime<Utc>>> {
    get_setting(pool, LAST_REFRESHED_AT_KEY)
        .await?
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", LAST_REFRESHED_AT_KEY, e)))
        })
        .transpose()
}

pub async fn set_last_refreshed_at(pool: &SqlitePool, at: DateTime<Utc>) -> Result<()> {
    set_setting(pool, LAST_REFRESHED_AT_KEY, &at.to_rfc3339()).await
}

/// Maximum time a write waits on a locked database
pub async fn get_max_lock_wait_ms(pool: &SqlitePool) -> Result<u64> {
    Ok(get_setting(pool, MAX_LOCK_WAIT_MS_KEY)
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_LOCK_WAIT_MS))
}
