//! Opaque single-use tokens bound to a subject.
//!
//! One generic store serves refresh, password-reset, and
//! email-verification tokens; instances differ only in key prefix,
//! TTL, and MAC secret. A token is a random identifier whose cache
//! entry binds it to its subject with an HMAC tag, so a tampered or
//! rebound entry fails verification exactly like a missing one.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheError, TtlCache};

type HmacSha256 = Hmac<Sha256>;

/// Errors surfaced by the opaque token store.
#[derive(Debug)]
pub enum TokenError {
    /// The token is unknown, expired, revoked, or failed its integrity
    /// check. Callers cannot tell which.
    Invalid,
    /// The cache backend failed.
    Cache(CacheError),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Invalid => write!(f, "invalid token"),
            TokenError::Cache(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<CacheError> for TokenError {
    fn from(e: CacheError) -> Self {
        TokenError::Cache(e)
    }
}

/// Store for opaque tokens of one purpose.
#[derive(Clone)]
pub struct OpaqueTokenStore {
    cache: Arc<dyn TtlCache>,
    secret: Vec<u8>,
    ttl: Duration,
    prefix: &'static str,
}

impl OpaqueTokenStore {
    /// Create a store. Each purpose must use its own secret so that a
    /// leaked secret for one purpose cannot forge tokens for another.
    pub fn new(
        cache: Arc<dyn TtlCache>,
        secret: &str,
        ttl: Duration,
        prefix: &'static str,
    ) -> Self {
        Self {
            cache,
            secret: secret.as_bytes().to_vec(),
            ttl,
            prefix,
        }
    }

    /// Generate a token bound to `subject` and persist the binding
    /// under this store's TTL. The returned identifier is the only
    /// copy of the token.
    pub async fn create(&self, subject: &str) -> Result<String, TokenError> {
        if subject.is_empty() {
            return Err(TokenError::Invalid);
        }

        let token = generate_token_id();
        let tag = self.sign(&token, subject);
        let value = format!("{}:{}", subject, tag);

        self.cache.set(&self.key(&token), &value, self.ttl).await?;
        Ok(token)
    }

    /// Verify a token and return its bound subject.
    ///
    /// A missing entry, an expired entry, a malformed entry, and a
    /// tag mismatch all report the same [`TokenError::Invalid`].
    pub async fn verify(&self, token: &str) -> Result<String, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Invalid);
        }

        let value = self
            .cache
            .get(&self.key(token))
            .await?
            .ok_or(TokenError::Invalid)?;

        let (subject, tag) = value.split_once(':').ok_or(TokenError::Invalid)?;
        let tag = hex::decode(tag).map_err(|_| TokenError::Invalid)?;

        let mut mac = self.mac();
        mac.update(token.as_bytes());
        mac.update(b":");
        mac.update(subject.as_bytes());
        mac.verify_slice(&tag).map_err(|_| TokenError::Invalid)?;

        Ok(subject.to_string())
    }

    /// Delete a token. Revoking an absent token is not an error.
    pub async fn revoke(&self, token: &str) -> Result<(), TokenError> {
        if token.is_empty() {
            return Ok(());
        }
        self.cache.del(&[self.key(token).as_str()]).await?;
        Ok(())
    }

    fn key(&self, token: &str) -> String {
        format!("{}{}", self.prefix, token)
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length")
    }

    fn sign(&self, token: &str, subject: &str) -> String {
        let mut mac = self.mac();
        mac.update(token.as_bytes());
        mac.update(b":");
        mac.update(subject.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Generate a random token identifier with 256 bits of entropy.
fn generate_token_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
