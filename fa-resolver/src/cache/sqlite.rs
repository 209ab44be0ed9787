//! SQLite cache store
//!
//! Entries live in the `cache_entries` table, so every process opening the
//! same database file shares them.

use super::{CacheEntry, CacheError, CacheStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    /// `pool` must already have the `cache_entries` table (see [`crate::db::init_tables`])
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Drop every entry whose stale window has passed
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheError> {
        let rows = sqlx::query("SELECT key, stored_at, ttl_secs, stale_ttl_secs FROM cache_entries")
            .fetch_all(&self.pool)
            .await?;

        let mut removed = 0;
        for row in rows {
            let key: String = row.get("key");
            let stored_at: String = row.get("stored_at");
            let ttl: i64 = row.get("ttl_secs");
            let stale: i64 = row.get("stale_ttl_secs");

            let expired = match parse_timestamp(&stored_at) {
                Ok(stored_at) => {
                    let limit = ttl.max(0).saturating_add(stale.max(0));
                    now.signed_duration_since(stored_at).num_seconds() >= limit
                }
                Err(_) => true,
            };

            if expired {
                self.delete(&key).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(removed, "Purged expired cache entries");
        }

        Ok(removed)
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::Serialization(format!("Failed to parse stored_at: {}", e)))
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let row = sqlx::query(
            "SELECT value, stored_at, ttl_secs, stale_ttl_secs FROM cache_entries WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stored_at: String = row.get("stored_at");
        Ok(Some(CacheEntry {
            value: row.get("value"),
            stored_at: parse_timestamp(&stored_at)?,
            ttl_secs: row.get::<i64, _>("ttl_secs").max(0) as u64,
            stale_ttl_secs: row.get::<i64, _>("stale_ttl_secs").max(0) as u64,
        }))
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, stored_at, ttl_secs, stale_ttl_secs)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                stored_at = excluded.stored_at,
                ttl_secs = excluded.ttl_secs,
                stale_ttl_secs = excluded.stale_ttl_secs
            "#,
        )
        .bind(key)
        .bind(&entry.value)
        .bind(entry.stored_at.to_rfc3339())
        .bind(i64::try_from(entry.ttl_secs).unwrap_or(i64::MAX))
        .bind(i64::try_from(entry.stale_ttl_secs).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
