pub mod cache;
pub mod errors;
pub mod schema;
pub mod store;
pub mod types;

// Re-export the adapter surface and the store handle
pub use cache::{clear, get_item, get_item_or, remove_item, set_item, TableCache};
pub use errors::CacheError;
pub use store::Store;
pub use types::*;

use std::path::PathBuf;

/// Eagerly open the shared cache and return a handle to it
pub async fn init_cache() -> anyhow::Result<&'static TableCache> {
    let cache = cache::shared();
    cache.health_check().await?;
    Ok(cache)
}

/// Get the default store path
pub fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".table-cache")
        .join(cache::STORE_FILE)
}

/// Check if the default store file exists
pub fn store_exists() -> bool {
    default_store_path().exists()
}
