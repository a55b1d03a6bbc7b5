//! Bearer-token authentication for protected endpoints.
//!
//! Protected routes receive the identity through the [`AuthUser`]
//! extractor, which validates the access token from the Authorization
//! header. Validity is entirely stateless; revocation latency is
//! bounded by the access token TTL.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::api::error::ApiError;
use crate::jwt::JwtConfig;

/// Cookie name for the refresh token side channel.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// State that can validate access tokens.
pub trait HasJwt {
    fn jwt(&self) -> &JwtConfig;
}

/// The authenticated caller, as proven by a valid access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Subject (user id)
    pub subject: String,
    /// Role carried in the token
    pub role: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: HasJwt + Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;

        let claims = state
            .jwt()
            .validate(token)
            .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

        Ok(AuthUser {
            subject: claims.sub,
            role: claims.role,
        })
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid authorization header"))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| ApiError::unauthorized("Invalid authorization header"))?;

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(ApiError::unauthorized("Invalid authorization header"));
    }
    Ok(token)
}

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}
