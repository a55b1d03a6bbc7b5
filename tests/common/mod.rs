#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use reverb::ServerConfig;
use reverb::cache::MemoryCache;
use reverb::create_app;
use reverb::db::MemoryUserStore;
use reverb::mail::{MailError, MailSender};
use reverb::rate_limit::RateLimitSettings;
use reverb::service::{AuthConfig, AuthService};

/// A message captured by the recording mailer.
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Mail sender that records messages instead of delivering them.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            text_body: text_body.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }
}

/// Mail sender whose every delivery fails.
pub struct FailingMailer;

#[async_trait]
impl MailSender for FailingMailer {
    async fn send(&self, _: &str, _: &str, _: &str, _: &str) -> Result<(), MailError> {
        Err(MailError("connection refused".to_string()))
    }
}

/// Auth config for tests: distinct secrets per purpose, cheap bcrypt,
/// short-but-not-flaky TTLs, and a lockout threshold of 5.
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-jwt-secret-0123456789abcdef".to_string(),
        access_token_ttl: Duration::from_secs(300),
        access_token_issuer: "reverb-test".to_string(),
        refresh_token_secret: "test-refresh-secret-0123456789ab".to_string(),
        refresh_token_ttl: Duration::from_secs(600),
        password_reset_secret: "test-reset-secret-0123456789abcd".to_string(),
        password_reset_ttl: Duration::from_secs(600),
        verify_email_secret: "test-verify-secret-0123456789abc".to_string(),
        verify_email_ttl: Duration::from_secs(600),
        login_attempt_window: Duration::from_secs(60),
        login_lock_ttl: Duration::from_secs(60),
        login_max_attempts: 5,
        bcrypt_cost: 4,
        public_url: "http://localhost:3000".to_string(),
        require_verified_email: false,
    }
}

/// Build an orchestrator over in-memory collaborators.
pub fn build_service(mailer: Option<Arc<dyn MailSender>>, cfg: &AuthConfig) -> AuthService {
    AuthService::new(
        Arc::new(MemoryUserStore::new()),
        Arc::new(MemoryCache::new()),
        mailer,
        cfg,
    )
}

/// Rate limits high enough to stay out of the way unless a test is
/// about them.
pub fn lenient_rate_limits() -> RateLimitSettings {
    RateLimitSettings {
        global_max: 10_000,
        global_window: Duration::from_secs(60),
        login_max: 10_000,
        login_window: Duration::from_secs(60),
    }
}

/// Build the full router over in-memory collaborators.
pub fn build_app(
    mailer: Option<Arc<dyn MailSender>>,
    auth: AuthConfig,
    rate_limit: RateLimitSettings,
) -> Router {
    let config = ServerConfig {
        auth,
        rate_limit,
        secure_cookies: false,
    };
    create_app(
        Arc::new(MemoryUserStore::new()),
        Arc::new(MemoryCache::new()),
        mailer,
        &config,
    )
}

/// POST a JSON body and return status, headers, and parsed JSON body.
pub async fn post_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, HeaderMap, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// POST a JSON body with extra headers.
pub async fn post_json_with_headers(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
    headers: &[(&str, &str)],
) -> (StatusCode, HeaderMap, serde_json::Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    send(app, request).await
}

/// GET with optional bearer token.
pub async fn get_authed(
    app: &Router,
    uri: &str,
    bearer: Option<&str>,
) -> (StatusCode, HeaderMap, serde_json::Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = builder.body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, headers, body)
}

/// Pull the refresh-token cookie value out of Set-Cookie headers.
pub fn refresh_cookie_value(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all(header::SET_COOKIE) {
        let value = value.to_str().ok()?;
        if let Some(rest) = value.strip_prefix("refresh_token=") {
            let token = rest.split(';').next().unwrap_or("").to_string();
            return Some(token);
        }
    }
    None
}

/// Pull the opaque token out of an emailed link ("...?token=<id>").
pub fn token_from_mail(text_body: &str) -> String {
    text_body
        .split("token=")
        .nth(1)
        .expect("mail body contains a token link")
        .trim()
        .to_string()
}
