//! Shared TTL cache used for opaque tokens and windowed counters.
//!
//! All token records, lockouts, and rate-limit counters live in this
//! cache rather than in process memory, so any number of server
//! processes share one view of them. The Redis implementation is the
//! production backend; the in-memory implementation backs local
//! development and tests.

mod memory;
mod redis;

pub use memory::MemoryCache;
pub use redis::RedisCache;

use async_trait::async_trait;
use std::time::Duration;

/// Error from a cache backend (network, protocol, or connection).
#[derive(Debug)]
pub struct CacheError(pub String);

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cache error: {}", self.0)
    }
}

impl std::error::Error for CacheError {}

/// A key-value store with native entry expiry.
///
/// `incr` must be atomic: two concurrent increments of the same key
/// observe distinct counts. Expiry is a separate call so that only the
/// request observing a fresh counter (count == 1) sets the window TTL.
#[async_trait]
pub trait TtlCache: Send + Sync {
    /// Atomically increment the integer at `key`, creating it at 0
    /// first if absent. Returns the post-increment value.
    async fn incr(&self, key: &str) -> Result<i64, CacheError>;

    /// Set the TTL on an existing key. A missing key is not an error.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Store a value under `key` with the given TTL, replacing any
    /// previous value and TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Fetch the value at `key`, or None if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Delete the given keys. Missing keys are ignored.
    async fn del(&self, keys: &[&str]) -> Result<(), CacheError>;

    /// Whether `key` exists and is unexpired.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
}
