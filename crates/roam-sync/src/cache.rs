use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use roam_db::Database;
use roam_types::api::CachedConnection;
use roam_types::{ConnectionViewState, UserId};

use crate::error::CacheError;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Raw storage behind the local cache. Implementations know nothing about
/// expiry.
pub trait CacheStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<CachedConnection>, CacheError>;
    fn write(&self, key: &str, entry: &CachedConnection) -> Result<(), CacheError>;
    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

impl CacheStore for Database {
    fn read(&self, key: &str) -> Result<Option<CachedConnection>, CacheError> {
        self.load_cached_connection(key)
            .map_err(|e| CacheError(e.to_string()))
    }

    fn write(&self, key: &str, entry: &CachedConnection) -> Result<(), CacheError> {
        self.save_cached_connection(key, entry)
            .map_err(|e| CacheError(e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.delete_entry(key)
            .map(|_| ())
            .map_err(|e| CacheError(e.to_string()))
    }
}

/// Non-durable store, for tests and for hosts without a writable disk.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CachedConnection>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn read(&self, key: &str) -> Result<Option<CachedConnection>, CacheError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, entry: &CachedConnection) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), entry.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Storage key for a counterpart's cached state.
pub fn cache_key(counterpart: &UserId) -> String {
    format!("connection_{}", counterpart)
}

/// Best-effort, short-lived mirror of the last known state per counterpart.
///
/// Only consulted when the remote lookup fails. Storage errors are logged
/// and otherwise swallowed.
#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl LocalCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn save(&self, counterpart: &UserId, state: &ConnectionViewState) {
        let entry = CachedConnection::new(state, Utc::now().timestamp_millis());
        if let Err(e) = self.store.write(&cache_key(counterpart), &entry) {
            warn!("Failed to cache connection state for {}: {}", counterpart, e);
        }
    }

    /// Returns the cached state if it is younger than the TTL. Expired
    /// entries are cleared.
    pub fn load(&self, counterpart: &UserId) -> Option<ConnectionViewState> {
        let key = cache_key(counterpart);
        let entry = match self.store.read(&key) {
            Ok(entry) => entry?,
            Err(e) => {
                warn!("Failed to read cached connection state for {}: {}", counterpart, e);
                return None;
            }
        };

        let age_ms = Utc::now().timestamp_millis().saturating_sub(entry.timestamp);
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        if age_ms >= ttl_ms {
            debug!("Cached connection state for {} expired ({} ms old)", counterpart, age_ms);
            self.clear(counterpart);
            return None;
        }

        Some(entry.view_state())
    }

    pub fn clear(&self, counterpart: &UserId) {
        if let Err(e) = self.store.remove(&cache_key(counterpart)) {
            warn!("Failed to clear cached connection state for {}: {}", counterpart, e);
        }
    }
}
