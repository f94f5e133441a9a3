use crate::errors::Result;
use rusqlite::Connection;

/// Schema version recorded in the store; bumped when the layout changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the cache schema.
///
/// Creation happens exactly once, gated on the store's `user_version`;
/// reopening an up-to-date store leaves it untouched.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;

    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version >= SCHEMA_VERSION {
        log::debug!("Cache schema up to date (v{})", version);
        return Ok(());
    }

    log::info!("Creating cache schema...");

    conn.execute_batch(FULL_SCHEMA)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

    log::info!("Cache schema created successfully");
    Ok(())
}

// Complete cache schema - entry table, inspection index, and meta
const FULL_SCHEMA: &str = r#"
-- Table cache schema v1

-- Cached entries, one row per key
CREATE TABLE IF NOT EXISTS table_cache (
    key          TEXT PRIMARY KEY,   -- opaque entry key
    val          TEXT NOT NULL,      -- JSON blob of the cached value
    last_updated INTEGER NOT NULL    -- epoch seconds
);

CREATE INDEX IF NOT EXISTS idx_table_cache_updated ON table_cache(last_updated);

-- Meta table for key-value bookkeeping
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    val TEXT
);

INSERT OR IGNORE INTO meta (key, val) VALUES
    ('schema_version', '1');
"#;
