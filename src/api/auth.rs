//! Authentication API endpoints.
//!
//! - POST `/register` - Create an account and sign it in
//! - POST `/login` - Authenticate with email and password
//! - POST `/refresh` - Rotate the refresh token, mint a new access token
//! - POST `/logout` - Revoke the refresh token and clear its cookie
//! - POST `/forgot-password` - Email a password-reset link
//! - POST `/reset-password` - Set a new password with a reset token
//! - POST `/verify-email` - Confirm an email address
//! - GET  `/me` - Current account, from the access token
//!
//! Access tokens travel in the JSON body; refresh tokens only in an
//! HttpOnly cookie scoped to this router.

use axum::{
    Json, Router,
    extract::{Request, State},
    http::header::SET_COOKIE,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::{AuthUser, HasJwt, REFRESH_COOKIE_NAME, get_cookie};
use crate::db::User;
use crate::jwt::JwtConfig;
use crate::service::{AuthService, AuthTokens};

/// Cookie path: the refresh token is only ever needed by this router.
const REFRESH_COOKIE_PATH: &str = "/api/auth";

#[derive(Clone)]
pub struct AuthState {
    pub auth: Arc<AuthService>,
    pub secure_cookies: bool,
    /// Max-Age for the refresh cookie, matching the token's TTL.
    pub refresh_ttl_secs: u64,
}

impl HasJwt for AuthState {
    fn jwt(&self) -> &JwtConfig {
        self.auth.jwt()
    }
}

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/verify-email", post(verify_email))
        .route("/me", get(me))
        .with_state(state)
}

/// The login route, split out so the strict rate limiter can be
/// layered onto it alone.
pub fn login_router(state: AuthState) -> Router {
    Router::new().route("/login", post(login)).with_state(state)
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct ForgotPasswordRequest {
    email: String,
}

#[derive(Deserialize)]
struct ResetPasswordRequest {
    token: String,
    password: String,
}

#[derive(Deserialize)]
struct VerifyEmailRequest {
    token: String,
}

#[derive(Serialize)]
struct UserResponse {
    id: String,
    email: String,
    role: String,
    email_verified: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            email_verified: user.email_verified,
        }
    }
}

#[derive(Serialize)]
struct AuthResponse {
    access_token: String,
    token_type: &'static str,
    /// Access token expiry (Unix seconds)
    expires_at: u64,
    user: UserResponse,
}

async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, tokens) = state.auth.register(&payload.email, &payload.password).await?;
    Ok(auth_response(&state, user, tokens))
}

async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, tokens) = state.auth.login(&payload.email, &payload.password).await?;
    Ok(auth_response(&state, user, tokens))
}

async fn refresh(
    State(state): State<AuthState>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let refresh_token = get_cookie(request.headers(), REFRESH_COOKIE_NAME)
        .ok_or_else(|| ApiError::unauthorized("Missing refresh token"))?
        .to_string();

    let (user, tokens) = state.auth.refresh(&refresh_token).await?;
    Ok(auth_response(&state, user, tokens))
}

async fn logout(
    State(state): State<AuthState>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    // Revoke when a token is presented; clear the cookie either way.
    if let Some(refresh_token) = get_cookie(request.headers(), REFRESH_COOKIE_NAME) {
        state.auth.logout(refresh_token).await?;
    }

    Ok((
        [(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))],
        Json(serde_json::json!({ "success": true })),
    ))
}

async fn forgot_password(
    State(state): State<AuthState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.forgot_password(&payload.email).await?;
    Ok(Json(serde_json::json!({ "sent": true })))
}

async fn reset_password(
    State(state): State<AuthState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .auth
        .reset_password(&payload.token, &payload.password)
        .await?;
    Ok(Json(serde_json::json!({ "reset": true })))
}

async fn verify_email(
    State(state): State<AuthState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.verify_email(&payload.token).await?;
    Ok(Json(serde_json::json!({ "verified": true })))
}

async fn me(
    State(state): State<AuthState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .auth
        .get_user(&auth.subject)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    Ok(Json(UserResponse::from(user)))
}

/// Build the success response for the token-bearing flows: access
/// token in the body, refresh token in its cookie.
fn auth_response(state: &AuthState, user: User, tokens: AuthTokens) -> impl IntoResponse + use<> {
    let cookie = refresh_cookie(
        &tokens.refresh_token,
        state.refresh_ttl_secs,
        state.secure_cookies,
    );

    (
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            access_token: tokens.access_token,
            token_type: tokens.token_type,
            expires_at: tokens.expires_at,
            user: UserResponse::from(user),
        }),
    )
}

fn refresh_cookie(token: &str, max_age: u64, secure_cookies: bool) -> String {
    let secure = if secure_cookies { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path={}; Max-Age={}{}",
        REFRESH_COOKIE_NAME, token, REFRESH_COOKIE_PATH, max_age, secure
    )
}

fn clear_refresh_cookie(secure_cookies: bool) -> String {
    let secure = if secure_cookies { "; Secure" } else { "" };
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path={}; Max-Age=0{}",
        REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH, secure
    )
}
