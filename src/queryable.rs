//! Queryable SQLite tier.
//!
//! Entries live in a relational `cache` table, so counting, key enumeration,
//! batch access and the expiry sweep are single SQL statements instead of
//! full scans. Unlike the other tiers, a write without a TTL gets the
//! configured default expiration window: this tier holds bounded-lifetime,
//! queryable data, never permanent state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row};

use crate::entry::{CacheEntry, now_ms};
use crate::error::CacheError;
use crate::lock::{rw_read, rw_write};
use crate::tier::{CacheTier, TierStats, TierType};

const SOURCE: &str = "strati::queryable";

const CREATE_TABLE_SQL: &str = "\
CREATE TABLE IF NOT EXISTS cache (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expire_time INTEGER NOT NULL,
    created_at INTEGER NOT NULL
)";

const UPSERT_TAIL_SQL: &str = " ON CONFLICT(key) DO UPDATE SET \
    value = excluded.value, \
    expire_time = excluded.expire_time, \
    created_at = excluded.created_at";

fn db_err(err: sqlx::Error) -> CacheError {
    CacheError::backend(TierType::Queryable, err.to_string())
}

/// SQLite-backed tier with predicate queries and batch operations.
pub struct QueryableTier {
    db_path: PathBuf,
    default_ttl: Duration,
    max_connections: u32,
    pool: RwLock<Option<SqlitePool>>,
}

impl QueryableTier {
    pub fn new(db_path: PathBuf, default_ttl: Duration, max_connections: u32) -> Self {
        Self {
            db_path,
            default_ttl,
            max_connections,
            pool: RwLock::new(None),
        }
    }

    /// Open the database (creating it if missing) and ensure the schema.
    pub async fn init(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| CacheError::backend(TierType::Queryable, err.to_string()))?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(&self.db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await
            .map_err(db_err)?;
        sqlx::query(CREATE_TABLE_SQL)
            .execute(&pool)
            .await
            .map_err(db_err)?;
        *rw_write(&self.pool, SOURCE, "init") = Some(pool);
        Ok(())
    }

    /// Close the connection pool. Safe to call when already closed.
    pub async fn close(&self) -> Result<(), CacheError> {
        let pool = rw_write(&self.pool, SOURCE, "close").take();
        if let Some(pool) = pool {
            pool.close().await;
        }
        Ok(())
    }

    fn pool(&self) -> Result<SqlitePool, CacheError> {
        rw_read(&self.pool, SOURCE, "pool")
            .clone()
            .ok_or_else(|| CacheError::not_initialized(TierType::Queryable))
    }

    /// The expiry stamp for a write, falling back to the default window.
    fn expire_stamp(&self, entry: &CacheEntry) -> i64 {
        entry
            .expire_time
            .unwrap_or(entry.created_at + self.default_ttl.as_millis() as i64)
    }

    /// Fetch several keys in one `IN` query. Expired rows are skipped; rows
    /// whose payload no longer parses are skipped as well and left for the
    /// next sweep to delete.
    pub async fn get_batch(&self, keys: &[String]) -> Result<HashMap<String, Value>, CacheError> {
        let mut found = HashMap::new();
        if keys.is_empty() {
            return Ok(found);
        }
        let pool = self.pool()?;

        let mut builder =
            QueryBuilder::new("SELECT key, value FROM cache WHERE expire_time > ");
        builder.push_bind(now_ms());
        builder.push(" AND key IN (");
        let mut list = builder.separated(", ");
        for key in keys {
            list.push_bind(key.as_str());
        }
        builder.push(")");

        let rows = builder.build().fetch_all(&pool).await.map_err(db_err)?;
        for row in rows {
            let key: String = row.get("key");
            let raw: String = row.get("value");
            if let Ok(value) = serde_json::from_str(&raw) {
                found.insert(key, value);
            }
        }
        Ok(found)
    }

    /// Upsert several entries in one statement, all sharing one TTL (the
    /// default window when none is given). Values that fail to serialize are
    /// dropped from the batch rather than failing it.
    pub async fn set_batch(
        &self,
        entries: &[(String, Value)],
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let pool = self.pool()?;
        let now = now_ms();
        let expire_time = now + ttl.unwrap_or(self.default_ttl).as_millis() as i64;

        let rows: Vec<(&String, String)> = entries
            .iter()
            .filter_map(|(key, value)| {
                serde_json::to_string(value).ok().map(|raw| (key, raw))
            })
            .collect();
        if rows.is_empty() {
            return Ok(());
        }

        let mut builder =
            QueryBuilder::new("INSERT INTO cache (key, value, expire_time, created_at) ");
        builder.push_values(rows, |mut b, (key, raw)| {
            b.push_bind(key.as_str())
                .push_bind(raw)
                .push_bind(expire_time)
                .push_bind(now);
        });
        builder.push(UPSERT_TAIL_SQL);
        builder.build().execute(&pool).await.map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl CacheTier for QueryableTier {
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        let pool = self.pool()?;
        let raw = serde_json::to_string(&entry.value)
            .map_err(|err| CacheError::unsupported(err.to_string()))?;
        let sql = format!(
            "INSERT INTO cache (key, value, expire_time, created_at) VALUES (?, ?, ?, ?){UPSERT_TAIL_SQL}"
        );
        sqlx::query(&sql)
            .bind(key)
            .bind(raw)
            .bind(self.expire_stamp(&entry))
            .bind(entry.created_at)
            .execute(&pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let pool = self.pool()?;
        let row = sqlx::query("SELECT value, expire_time FROM cache WHERE key = ?")
            .bind(key)
            .fetch_optional(&pool)
            .await
            .map_err(db_err)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let expire_time: i64 = row.get("expire_time");
        if now_ms() >= expire_time {
            sqlx::query("DELETE FROM cache WHERE key = ?")
                .bind(key)
                .execute(&pool)
                .await
                .map_err(db_err)?;
            return Ok(None);
        }

        let raw: String = row.get("value");
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                // Corrupt payload: miss plus delete.
                sqlx::query("DELETE FROM cache WHERE key = ?")
                    .bind(key)
                    .execute(&pool)
                    .await
                    .map_err(db_err)?;
                Ok(None)
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let pool = self.pool()?;
        sqlx::query("DELETE FROM cache WHERE key = ?")
            .bind(key)
            .execute(&pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let pool = self.pool()?;
        sqlx::query("DELETE FROM cache")
            .execute(&pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        let pool = self.pool()?;
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM cache WHERE key = ? AND expire_time > ?)",
        )
        .bind(key)
        .bind(now_ms())
        .fetch_one(&pool)
        .await
        .map_err(db_err)?;
        Ok(exists != 0)
    }

    async fn clean_expired(&self) -> Result<usize, CacheError> {
        let pool = self.pool()?;
        let result = sqlx::query("DELETE FROM cache WHERE expire_time <= ?")
            .bind(now_ms())
            .execute(&pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() as usize)
    }

    async fn stats(&self) -> Result<TierStats, CacheError> {
        let pool = self.pool()?;
        let now = now_ms();

        let expired_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cache WHERE expire_time <= ?")
                .bind(now)
                .fetch_one(&pool)
                .await
                .map_err(db_err)?;
        let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM cache WHERE expire_time > ?")
            .bind(now)
            .fetch_all(&pool)
            .await
            .map_err(db_err)?;

        Ok(TierStats {
            count: keys.len(),
            expired_count: expired_count as usize,
            keys: keys.into_iter().collect(),
        })
    }
}
