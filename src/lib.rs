pub mod api;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod mail;
pub mod password;
pub mod rate_limit;
pub mod service;
pub mod token;

use axum::{Router, middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use api::AuthState;
use cache::TtlCache;
use db::UserStore;
use mail::MailSender;
use rate_limit::{RateLimitSettings, RateLimiter, rate_limit};
use service::{AuthConfig, AuthService};

/// Everything the server needs besides its collaborators.
pub struct ServerConfig {
    /// Secrets, TTLs, and thresholds for the auth flows
    pub auth: AuthConfig,
    /// Per-IP admission thresholds
    pub rate_limit: RateLimitSettings,
    /// Whether to set Secure on cookies (true behind HTTPS)
    pub secure_cookies: bool,
}

/// Create the application router with the given collaborators.
pub fn create_app(
    users: Arc<dyn UserStore>,
    cache: Arc<dyn TtlCache>,
    mailer: Option<Arc<dyn MailSender>>,
    config: &ServerConfig,
) -> Router {
    let auth_service = Arc::new(AuthService::new(
        users,
        cache.clone(),
        mailer,
        &config.auth,
    ));

    let state = AuthState {
        auth: auth_service,
        secure_cookies: config.secure_cookies,
        refresh_ttl_secs: config.auth.refresh_token_ttl.as_secs(),
    };

    let global_limiter = Arc::new(RateLimiter::global(cache.clone(), &config.rate_limit));
    let login_limiter = Arc::new(RateLimiter::login(cache, &config.rate_limit));

    Router::new()
        .nest("/api", api::create_api_router(state, login_limiter))
        .layer(middleware::from_fn_with_state(global_limiter, rate_limit))
}

/// Run the server on the given listener. This function blocks until
/// the server exits.
pub async fn run_server(app: Router, listener: TcpListener) -> Result<(), std::io::Error> {
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
