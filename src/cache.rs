use crate::errors::{CacheError, Result};
use crate::store::Store;
use crate::types::{CacheEntry, CacheStats};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::OnceLock;
use tokio::sync::OnceCell;

/// File name of the on-disk store backing the default cache.
pub const STORE_FILE: &str = "table_cache.db";

enum StoreLocation {
    Disk(PathBuf),
    Memory,
}

/// Outcome of a failed open as observed by a single call.
enum OpenFailure {
    /// This call performed the open and saw it fail.
    First(CacheError),
    /// An earlier call already failed to open the store.
    Earlier,
}

impl OpenFailure {
    fn into_error(self) -> CacheError {
        match self {
            OpenFailure::First(e) => e,
            OpenFailure::Earlier => {
                CacheError::StoreOpen("store unavailable after earlier failed open".to_string())
            }
        }
    }
}

/// Cache adapter over a single `table_cache` collection.
///
/// The backing store is opened on first use and the handle is memoized
/// for the lifetime of the adapter; concurrent first callers await the
/// same open. Write and delete failures are logged and swallowed so the
/// cache never takes down its caller; only the call that performs a
/// failed first open sees the error.
pub struct TableCache {
    location: StoreLocation,
    handle: OnceCell<Option<Store>>,
}

impl TableCache {
    /// Cache backed by a store file at `path`
    pub fn new(path: PathBuf) -> Self {
        TableCache {
            location: StoreLocation::Disk(path),
            handle: OnceCell::new(),
        }
    }

    /// Cache backed by an in-memory store
    pub fn in_memory() -> Self {
        TableCache {
            location: StoreLocation::Memory,
            handle: OnceCell::new(),
        }
    }

    /// Open the backing store on first use and memoize the handle.
    ///
    /// A failed open is memoized as well: the slot holds `None` and no
    /// re-open is attempted for the lifetime of the adapter.
    async fn open(&self) -> std::result::Result<&Store, OpenFailure> {
        let mut failure = None;
        let slot = self
            .handle
            .get_or_init(|| async {
                let opened = match &self.location {
                    StoreLocation::Disk(path) => Store::open_at_path(path.clone()).await,
                    StoreLocation::Memory => Store::open_in_memory().await,
                };

                match opened {
                    Ok(store) => Some(store),
                    Err(e) => {
                        let e = CacheError::StoreOpen(e.to_string());
                        log::error!("Failed to open table cache store: {}", e);
                        failure = Some(e);
                        None
                    }
                }
            })
            .await;

        match slot {
            Some(store) => Ok(store),
            None => match failure {
                Some(e) => Err(OpenFailure::First(e)),
                None => Err(OpenFailure::Earlier),
            },
        }
    }

    // ========== Adapter Operations ==========

    /// Store `value` under `key`.
    ///
    /// Write failures are logged and swallowed.
    pub async fn set_item(&self, key: &str, value: Value) -> Result<()> {
        let store = match self.open().await {
            Ok(store) => store,
            Err(OpenFailure::First(e)) => return Err(e),
            Err(OpenFailure::Earlier) => {
                log::debug!("Dropping set_item for {}: cache store unavailable", key);
                return Ok(());
            }
        };

        if let Err(e) = store.put(key, &value).await {
            log::error!("set_item failed for key {}: {}", key, e);
        }
        Ok(())
    }

    /// Read the value under `key`, or `Value::Null` when absent
    pub async fn get_item(&self, key: &str) -> Result<Value> {
        self.get_item_or(key, Value::Null).await
    }

    /// Read the value under `key`, or `default` when absent.
    ///
    /// A stored JSON `null` is a present value and is returned as-is.
    /// Read failures are logged and resolve with `default`.
    pub async fn get_item_or(&self, key: &str, default: Value) -> Result<Value> {
        let store = match self.open().await {
            Ok(store) => store,
            Err(OpenFailure::First(e)) => return Err(e),
            Err(OpenFailure::Earlier) => {
                log::debug!("Returning default for {}: cache store unavailable", key);
                return Ok(default);
            }
        };

        match store.fetch(key).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Ok(default),
            Err(e) => {
                log::error!("get_item failed for key {}: {}", key, e);
                Ok(default)
            }
        }
    }

    /// Delete the entry under `key`; unknown keys are a no-op.
    ///
    /// Delete failures are logged and swallowed.
    pub async fn remove_item(&self, key: &str) -> Result<()> {
        let store = match self.open().await {
            Ok(store) => store,
            Err(OpenFailure::First(e)) => return Err(e),
            Err(OpenFailure::Earlier) => {
                log::debug!("Dropping remove_item for {}: cache store unavailable", key);
                return Ok(());
            }
        };

        if let Err(e) = store.delete(key).await {
            log::error!("remove_item failed for key {}: {}", key, e);
        }
        Ok(())
    }

    /// Delete every cached entry.
    ///
    /// Failures are logged and swallowed.
    pub async fn clear(&self) -> Result<()> {
        let store = match self.open().await {
            Ok(store) => store,
            Err(OpenFailure::First(e)) => return Err(e),
            Err(OpenFailure::Earlier) => {
                log::debug!("Dropping clear: cache store unavailable");
                return Ok(());
            }
        };

        if let Err(e) = store.clear_entries().await {
            log::error!("clear failed: {}", e);
        }
        Ok(())
    }

    // ========== Inspection Methods ==========
    //
    // Unlike the adapter operations these propagate errors, so embedders
    // can observe what the swallowing surface hides.

    /// Get an entry with its metadata
    pub async fn entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let store = self.open().await.map_err(OpenFailure::into_error)?;
        store.entry(key).await
    }

    /// List all cached keys
    pub async fn keys(&self) -> Result<Vec<String>> {
        let store = self.open().await.map_err(OpenFailure::into_error)?;
        store.keys().await
    }

    /// Count cached entries
    pub async fn entry_count(&self) -> Result<usize> {
        let store = self.open().await.map_err(OpenFailure::into_error)?;
        store.entry_count().await
    }

    /// When the entry under `key` was last written
    pub async fn last_updated(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let store = self.open().await.map_err(OpenFailure::into_error)?;
        store.last_updated(key).await
    }

    /// Aggregate stats over the cache contents
    pub async fn stats(&self) -> Result<CacheStats> {
        let store = self.open().await.map_err(OpenFailure::into_error)?;
        store.stats().await
    }

    /// Health check - opens the store if needed and probes it
    pub async fn health_check(&self) -> Result<()> {
        let store = self.open().await.map_err(OpenFailure::into_error)?;
        store.health_check().await
    }
}

/// Shared process-wide cache at the default store path
pub fn shared() -> &'static TableCache {
    static SHARED: OnceLock<TableCache> = OnceLock::new();
    SHARED.get_or_init(|| TableCache::new(crate::default_store_path()))
}

/// Store `value` under `key` in the shared cache
pub async fn set_item(key: &str, value: Value) -> Result<()> {
    shared().set_item(key, value).await
}

/// Read the value under `key` from the shared cache, or `Value::Null`
pub async fn get_item(key: &str) -> Result<Value> {
    shared().get_item(key).await
}

/// Read the value under `key` from the shared cache, or `default`
pub async fn get_item_or(key: &str, default: Value) -> Result<Value> {
    shared().get_item_or(key, default).await
}

/// Delete the entry under `key` from the shared cache
pub async fn remove_item(key: &str) -> Result<()> {
    shared().remove_item(key).await
}

/// Delete every entry in the shared cache
pub async fn clear() -> Result<()> {
    shared().clear().await
}
