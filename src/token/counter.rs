//! Fixed-window counter on the shared cache.
//!
//! One primitive serves both the rate limiters and the login-attempt
//! guard: atomically increment a key, and have whichever caller
//! observes the fresh counter (count == 1) set the window TTL. Losing
//! that race is benign: the TTL lands slightly late, but no increment
//! is ever lost.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheError, TtlCache};

/// Counts events per key within a fixed window.
#[derive(Clone)]
pub struct WindowedCounter {
    cache: Arc<dyn TtlCache>,
    window: Duration,
}

impl WindowedCounter {
    pub fn new(cache: Arc<dyn TtlCache>, window: Duration) -> Self {
        Self { cache, window }
    }

    /// Record one event against `key` and return the count observed in
    /// the current window. The first event of a window starts the
    /// window clock.
    pub async fn hit(&self, key: &str) -> Result<i64, CacheError> {
        let count = self.cache.incr(key).await?;
        if count == 1 {
            self.cache.expire(key, self.window).await?;
        }
        Ok(count)
    }

    /// Discard the counter at `key`.
    pub async fn clear(&self, key: &str) -> Result<(), CacheError> {
        self.cache.del(&[key]).await
    }
}
