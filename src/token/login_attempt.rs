//! Per-identity login-attempt tracking and lockout.
//!
//! Consecutive failures are counted in an attempt window; reaching the
//! threshold replaces the counter with a lock record that has its own,
//! longer TTL. A present lock record always wins over the counter.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheError, TtlCache};

use super::WindowedCounter;

const ATTEMPT_PREFIX: &str = "login:mail:attempt:";
const LOCK_PREFIX: &str = "login:mail:lock:";

/// Tracks authentication failures per identity and enforces a
/// temporary lockout.
#[derive(Clone)]
pub struct LoginAttemptGuard {
    cache: Arc<dyn TtlCache>,
    attempts: WindowedCounter,
    lock_ttl: Duration,
    max_attempts: i64,
}

impl LoginAttemptGuard {
    pub fn new(
        cache: Arc<dyn TtlCache>,
        attempt_window: Duration,
        lock_ttl: Duration,
        max_attempts: i64,
    ) -> Self {
        Self {
            attempts: WindowedCounter::new(cache.clone(), attempt_window),
            cache,
            lock_ttl,
            max_attempts,
        }
    }

    /// Whether the identity is currently locked out.
    pub async fn is_locked(&self, identity: &str) -> Result<bool, CacheError> {
        let identity = normalize(identity);
        self.cache.exists(&lock_key(&identity)).await
    }

    /// Record one failed attempt. Returns the failure count and
    /// whether this failure engaged the lockout. On lock, the counter
    /// is cleared and the lock record carries its own TTL.
    pub async fn record_failure(&self, identity: &str) -> Result<(i64, bool), CacheError> {
        let identity = normalize(identity);
        let key = attempt_key(&identity);

        let count = self.attempts.hit(&key).await?;
        if count >= self.max_attempts {
            self.cache
                .set(&lock_key(&identity), "1", self.lock_ttl)
                .await?;
            self.attempts.clear(&key).await?;
            return Ok((count, true));
        }

        Ok((count, false))
    }

    /// Clear both the counter and any lock for the identity. Called on
    /// successful login.
    pub async fn reset(&self, identity: &str) -> Result<(), CacheError> {
        let identity = normalize(identity);
        self.cache
            .del(&[attempt_key(&identity).as_str(), lock_key(&identity).as_str()])
            .await
    }
}

fn attempt_key(identity: &str) -> String {
    format!("{}{}", ATTEMPT_PREFIX, identity)
}

fn lock_key(identity: &str) -> String {
    format!("{}{}", LOCK_PREFIX, identity)
}

fn normalize(identity: &str) -> String {
    identity.trim().to_lowercase()
}
