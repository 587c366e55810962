//! Cache backend stored in the statistics database
//!
//! Entries live in their own table so `--show` invocations in separate
//! processes see what the last run wrote.

use crate::cache::{detail_key, DetailCache, ProfessionDetail};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CACHE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);
"#;

/// SQLite-backed cache with millisecond expiry timestamps
#[derive(Clone)]
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCache {
    /// Opens the cache table in the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(CACHE_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CACHE_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| HarvestError::Cache("cache connection lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| HarvestError::Cache(format!("cache task failed: {}", e)))?
    }
}

#[async_trait]
impl DetailCache for SqliteCache {
    async fn load(&self, profession_id: i64) -> Result<Option<ProfessionDetail>> {
        let key = detail_key(profession_id);
        let now = Utc::now().timestamp_millis();

        let raw: Option<String> = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT value FROM cache_entries WHERE key = ?1 AND expires_at > ?2",
                        params![key, now],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;

        match raw {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| HarvestError::Cache(format!("corrupt cache entry: {}", e))),
            None => Ok(None),
        }
    }

    async fn save(&self, detail: &ProfessionDetail, ttl: Duration) -> Result<()> {
        let key = detail_key(detail.profession_id);
        let value = serde_json::to_string(detail)
            .map_err(|e| HarvestError::Cache(format!("failed to serialize entry: {}", e)))?;
        let expires_at = Utc::now().timestamp_millis() + ttl.as_millis() as i64;

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                expires_at = excluded.expires_at",
                params![key, value, expires_at],
            )?;
            Ok(())
        })
        .await
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
