//! In-memory TTL cache.
//!
//! Backs local development (no Redis configured) and tests. Not
//! durable, and not shared across processes: entries live in a single
//! map behind an async mutex, which also makes increments atomic.
//! Expired entries are dropped lazily on access.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{CacheError, TtlCache};

struct Entry {
    value: String,
    /// None until `expire` is called (matches Redis INCR, which
    /// creates counters without a TTL).
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }
}

/// TTL cache held entirely in process memory.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TtlCache for MemoryCache {
    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let mut entries = self.entries.lock().await;

        let current = match entries.get(key) {
            Some(entry) if !entry.expired() => entry
                .value
                .parse::<i64>()
                .map_err(|_| CacheError("value is not an integer".to_string()))?,
            _ => 0,
        };
        let count = current + 1;

        // Preserve an existing TTL across increments, like Redis INCR.
        let expires_at = entries
            .get(key)
            .filter(|e| !e.expired())
            .and_then(|e| e.expires_at);
        entries.insert(
            key.to_string(),
            Entry {
                value: count.to_string(),
                expires_at,
            },
        );

        Ok(count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key).map(Entry::expired) {
            Some(true) => {
                entries.remove(key);
            }
            Some(false) => {
                if let Some(entry) = entries.get_mut(key) {
                    entry.expires_at = Some(Instant::now() + ttl);
                }
            }
            None => {}
        }
        Ok(())
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;
        let value = match entries.get(key) {
            Some(entry) if entry.expired() => None,
            Some(entry) => Some(entry.value.clone()),
            None => None,
        };
        if value.is_none() {
            entries.remove(key);
        }
        Ok(value)
    }

    async fn del(&self, keys: &[&str]) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }
}
