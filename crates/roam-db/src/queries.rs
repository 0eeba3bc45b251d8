use crate::models::CacheRow;
use crate::Database;
use anyhow::Result;
use roam_types::api::CachedConnection;
use rusqlite::{Connection, OptionalExtension};
use tracing::warn;

impl Database {
    // -- Raw key/value --

    pub fn put_entry(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_cache (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                (key, value),
            )?;
            Ok(())
        })
    }

    pub fn get_entry(&self, key: &str) -> Result<Option<CacheRow>> {
        self.with_conn(|conn| query_entry(conn, key))
    }

    /// Returns true if a row was removed.
    pub fn delete_entry(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM kv_cache WHERE key = ?1", [key])?;
            Ok(n > 0)
        })
    }

    pub fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key FROM kv_cache WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
            )?;
            let keys = stmt
                .query_map([prefix], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(keys)
        })
    }

    // -- Connection cache --

    pub fn save_cached_connection(&self, key: &str, entry: &CachedConnection) -> Result<()> {
        let value = serde_json::to_string(entry)?;
        self.put_entry(key, &value)
    }

    /// Unparseable payloads are dropped and reported as absent.
    pub fn load_cached_connection(&self, key: &str) -> Result<Option<CachedConnection>> {
        let Some(row) = self.get_entry(key)? else {
            return Ok(None);
        };

        match serde_json::from_str(&row.value) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("Discarding corrupt cache entry '{}': {}", row.key, e);
                self.delete_entry(key)?;
                Ok(None)
            }
        }
    }
}

fn query_entry(conn: &Connection, key: &str) -> Result<Option<CacheRow>> {
    let mut stmt = conn.prepare("SELECT key, value, updated_at FROM kv_cache WHERE key = ?1")?;

    let row = stmt
        .query_row([key], |row| {
            Ok(CacheRow {
                key: row.get(0)?,
                value: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}
