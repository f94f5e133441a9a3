use crate::errors::{CacheError, Result};
use crate::schema::apply_schema;
use crate::types::{CacheEntry, CacheStats};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Open handle to the cache store
pub struct Store {
    connection: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Store {
    /// Open a store at a specific path, creating it if needed
    pub async fn open_at_path(path: PathBuf) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        log::info!("Opening cache store at: {:?}", path);

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        if let Err(e) = apply_schema(&conn) {
            log::error!("Failed to apply cache schema: {}", e);
            return Err(e);
        }

        let store = Store {
            connection: Arc::new(Mutex::new(conn)),
            path,
        };

        log::info!("Cache store initialized successfully");
        Ok(store)
    }

    /// Create an in-memory store for testing
    pub async fn open_in_memory() -> Result<Self> {
        log::info!("Creating in-memory cache store");

        let conn = Connection::open_in_memory()?;

        if let Err(e) = apply_schema(&conn) {
            log::error!("Failed to apply schema to in-memory store: {}", e);
            return Err(e);
        }

        let store = Store {
            connection: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        };

        log::info!("In-memory cache store initialized successfully");
        Ok(store)
    }

    /// Get the store path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Health check - ensure the store is accessible
    pub async fn health_check(&self) -> Result<()> {
        let conn = self.connection.lock().await;
        match conn.query_row("SELECT 1", [], |_| Ok(())) {
            Ok(_) => Ok(()),
            Err(e) => {
                log::error!("Health check failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Execute a closure with the store connection
    pub async fn with_connection<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send,
        R: Send,
    {
        let conn = self.connection.lock().await;
        f(&conn)
    }

    /// Execute a closure inside a read-write transaction
    pub async fn transaction<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send,
        R: Send,
    {
        let mut conn = self.connection.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| CacheError::Transaction(e.to_string()))?;

        let result = f(&tx)?;
        tx.commit()
            .map_err(|e| CacheError::Transaction(e.to_string()))?;
        Ok(result)
    }

    /// Get current UNIX timestamp
    pub fn current_timestamp() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    // ========== Entry Methods ==========

    /// Write a value under `key`, replacing any existing entry
    pub async fn put(&self, key: &str, value: &Value) -> Result<()> {
        let now = Self::current_timestamp();
        let payload = serde_json::to_string(value)?;

        self.transaction(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO table_cache (key, val, last_updated) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, payload, now],
            )?;

            log::debug!("Cached entry for key: {}", key);
            Ok(())
        })
        .await
    }

    /// Read the value stored under `key`
    pub async fn fetch(&self, key: &str) -> Result<Option<Value>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT val FROM table_cache WHERE key = ?1")?;
            let raw: Option<String> = stmt.query_row([key], |row| row.get(0)).optional()?;

            match raw {
                Some(text) => Ok(Some(serde_json::from_str(&text)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Delete the entry under `key`; unknown keys are a no-op
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.transaction(|conn| {
            conn.execute("DELETE FROM table_cache WHERE key = ?1", [key])?;
            Ok(())
        })
        .await
    }

    /// Delete every entry in the collection
    pub async fn clear_entries(&self) -> Result<()> {
        self.transaction(|conn| {
            conn.execute("DELETE FROM table_cache", [])?;
            log::info!("Cleared table cache");
            Ok(())
        })
        .await
    }

    // ========== Inspection Methods ==========

    /// Get an entry with its metadata
    pub async fn entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, val, last_updated FROM table_cache WHERE key = ?1",
            )?;

            let row = stmt
                .query_row([key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .optional()?;

            match row {
                Some((key, text, stamp)) => Ok(Some(CacheEntry {
                    key,
                    value: serde_json::from_str(&text)?,
                    last_updated: datetime_from_epoch(stamp)?,
                })),
                None => Ok(None),
            }
        })
        .await
    }

    /// List all cached keys
    pub async fn keys(&self) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM table_cache ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(keys)
        })
        .await
    }

    /// Count cached entries
    pub async fn entry_count(&self) -> Result<usize> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM table_cache", [], |row| {
                row.get(0)
            })?;
            Ok(count as usize)
        })
        .await
    }

    /// When the entry under `key` was last written
    pub async fn last_updated(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT last_updated FROM table_cache WHERE key = ?1")?;
            let stamp: Option<i64> = stmt.query_row([key], |row| row.get(0)).optional()?;

            stamp.map(datetime_from_epoch).transpose()
        })
        .await
    }

    /// Aggregate stats over the whole collection
    pub async fn stats(&self) -> Result<CacheStats> {
        self.with_connection(|conn| {
            let (entries, newest): (i64, Option<i64>) = conn.query_row(
                "SELECT COUNT(*), MAX(last_updated) FROM table_cache",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            Ok(CacheStats {
                entries: entries as usize,
                last_updated: newest.map(datetime_from_epoch).transpose()?,
            })
        })
        .await
    }

    /// Schema version recorded in the meta table
    pub async fn schema_version(&self) -> Result<Option<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT val FROM meta WHERE key = 'schema_version'")?;
            let version: Option<String> = stmt.query_row([], |row| row.get(0)).ok();
            Ok(version)
        })
        .await
    }
}

fn datetime_from_epoch(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| CacheError::InvalidData(format!("Timestamp out of range: {}", secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_creation() {
        let _ = env_logger::try_init();
        let temp_dir = TempDir::new().unwrap();
        let store_path = temp_dir.path().join("test.db");

        let store = Store::open_at_path(store_path).await.unwrap();
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_put_fetch_delete() {
        let _ = env_logger::try_init();
        let store = Store::open_in_memory().await.unwrap();

        store.put("rates", &json!({"usd": 1.0})).await.unwrap();
        assert_eq!(
            store.fetch("rates").await.unwrap(),
            Some(json!({"usd": 1.0}))
        );

        store.delete("rates").await.unwrap();
        assert_eq!(store.fetch("rates").await.unwrap(), None);

        // Deleting an unknown key is a no-op
        store.delete("rates").await.unwrap();
    }

    #[tokio::test]
    async fn test_schema_reused_on_reopen() {
        let _ = env_logger::try_init();
        let temp_dir = TempDir::new().unwrap();
        let store_path = temp_dir.path().join("test.db");

        let store = Store::open_at_path(store_path.clone()).await.unwrap();
        store.put("a", &json!(1)).await.unwrap();
        assert_eq!(store.schema_version().await.unwrap(), Some("1".to_string()));
        drop(store);

        let reopened = Store::open_at_path(store_path).await.unwrap();
        assert_eq!(reopened.fetch("a").await.unwrap(), Some(json!(1)));
        assert_eq!(
            reopened.schema_version().await.unwrap(),
            Some("1".to_string())
        );
    }
}
