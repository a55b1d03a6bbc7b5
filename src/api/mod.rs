mod auth;
pub mod error;
mod health;

use axum::{Router, middleware, routing::get};
use std::sync::Arc;

use crate::rate_limit::{RateLimiter, rate_limit};

pub use auth::AuthState;

/// Create the API router. The strict login limiter wraps only the
/// login route; the lenient global limiter is layered by the caller
/// over all traffic.
pub fn create_api_router(state: AuthState, login_limiter: Arc<RateLimiter>) -> Router {
    let login_routes = auth::login_router(state.clone())
        .layer(middleware::from_fn_with_state(login_limiter, rate_limit));

    let auth_routes = Router::new()
        .merge(auth::router(state))
        .merge(login_routes);

    Router::new()
        .nest("/auth", auth_routes)
        .route("/health", get(health::health))
}
