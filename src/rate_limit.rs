//! Rate limiting for the HTTP surface.
//!
//! Fixed-window counters per client IP, stored in the shared cache so
//! every server process enforces one budget. Two independent limiters:
//! a lenient global one applied to all traffic and a strict one
//! applied to credential endpoints to slow credential stuffing.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::cache::TtlCache;
use crate::token::WindowedCounter;

/// Key prefix for the global per-IP window.
pub const GLOBAL_RATE_PREFIX: &str = "rate:ip:";

/// Key prefix for the login-endpoint per-IP window.
pub const LOGIN_RATE_PREFIX: &str = "login:ip:";

/// Settings for the two limiters.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    /// Requests admitted per IP per global window.
    pub global_max: i64,
    /// Global window length.
    pub global_window: Duration,
    /// Requests admitted per IP per login window.
    pub login_max: i64,
    /// Login window length.
    pub login_window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            global_max: 100,
            global_window: Duration::from_secs(60),
            login_max: 5,
            login_window: Duration::from_secs(60),
        }
    }
}

/// A fixed-window per-key limiter.
#[derive(Clone)]
pub struct RateLimiter {
    counter: WindowedCounter,
    max: i64,
    prefix: &'static str,
}

impl RateLimiter {
    pub fn new(
        cache: Arc<dyn TtlCache>,
        prefix: &'static str,
        max: i64,
        window: Duration,
    ) -> Self {
        Self {
            counter: WindowedCounter::new(cache, window),
            max,
            prefix,
        }
    }

    /// Build the global limiter from settings.
    pub fn global(cache: Arc<dyn TtlCache>, settings: &RateLimitSettings) -> Self {
        Self::new(
            cache,
            GLOBAL_RATE_PREFIX,
            settings.global_max,
            settings.global_window,
        )
    }

    /// Build the login limiter from settings.
    pub fn login(cache: Arc<dyn TtlCache>, settings: &RateLimitSettings) -> Self {
        Self::new(
            cache,
            LOGIN_RATE_PREFIX,
            settings.login_max,
            settings.login_window,
        )
    }

    /// Record a request for `key` and decide admission. Exactly `max`
    /// requests per window are admitted.
    pub async fn allow(&self, key: &str) -> Result<bool, crate::cache::CacheError> {
        let count = self.counter.hit(&format!("{}{}", self.prefix, key)).await?;
        Ok(count <= self.max)
    }
}

/// Middleware enforcing a limiter against the client IP.
///
/// A request whose client IP cannot be determined is admitted (there
/// is no key to count it under). A cache failure denies: admission
/// control fails closed.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ip) = client_ip(&request) else {
        return next.run(request).await;
    };

    match limiter.allow(&ip).await {
        Ok(true) => next.run(request).await,
        Ok(false) => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Rate limit check failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

/// Extract the client IP: first hop of X-Forwarded-For when present
/// (reverse proxy), otherwise the socket address.
pub fn client_ip(request: &Request) -> Option<String> {
    if let Some(forwarded_for) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded_for.to_str() {
            if let Some(first_ip) = value.split(',').next() {
                let ip = first_ip.trim();
                if !ip.is_empty() {
                    return Some(ip.to_string());
                }
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
}
