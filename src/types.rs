use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ========== Cache Entry Types ==========

/// A cached entry together with its bookkeeping metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub last_updated: DateTime<Utc>,
}

/// Aggregate view of the cache contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub last_updated: Option<DateTime<Utc>>,
}
