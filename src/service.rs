//! Auth orchestration: register, login, refresh, logout,
//! forgot-password, reset-password, and verify-email flows.
//!
//! This is the only module with cross-cutting business logic; the
//! token stores, the credential verifier, and the collaborators it
//! composes each enforce their own invariants.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::cache::{CacheError, TtlCache};
use crate::db::{DEFAULT_ROLE, StoreError, User, UserStore};
use crate::jwt::{JwtConfig, JwtError};
use crate::mail::{self, MailSender};
use crate::password::{self, HashError};
use crate::token::{
    LoginAttemptGuard, OpaqueTokenStore, PASSWORD_RESET_PREFIX, REFRESH_TOKEN_PREFIX, TokenError,
    VERIFY_EMAIL_PREFIX,
};

const MIN_PASSWORD_LENGTH: usize = 8;

/// Tuning and secrets for the auth flows, passed in at construction so
/// tests can run with their own secrets and short TTLs.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub access_token_issuer: String,
    pub refresh_token_secret: String,
    pub refresh_token_ttl: Duration,
    pub password_reset_secret: String,
    pub password_reset_ttl: Duration,
    pub verify_email_secret: String,
    pub verify_email_ttl: Duration,
    pub login_attempt_window: Duration,
    pub login_lock_ttl: Duration,
    pub login_max_attempts: i64,
    pub bcrypt_cost: u32,
    /// Public base URL embedded in emailed links.
    pub public_url: String,
    /// Reject logins from accounts that have not confirmed their email.
    pub require_verified_email: bool,
}

/// Errors surfaced by the auth flows.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    /// Malformed or missing fields.
    InvalidInput(&'static str),
    /// The email is already registered.
    EmailExists,
    /// Wrong identity or secret, or a refresh-token failure. The
    /// message is deliberately uniform to prevent enumeration.
    InvalidCredentials,
    /// Login-attempt lockout engaged.
    TooManyAttempts,
    /// Password-reset token failed verification.
    InvalidResetToken,
    /// Email-verification token failed verification.
    InvalidVerifyToken,
    /// The account has not confirmed its email address.
    EmailNotVerified,
    /// No mail sender is configured.
    MailNotConfigured,
    /// Cache, store, or crypto failure. Detail is logged, not surfaced.
    Internal(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidInput(msg) => write!(f, "{}", msg),
            AuthError::EmailExists => write!(f, "email already exists"),
            AuthError::InvalidCredentials => write!(f, "invalid credentials"),
            AuthError::TooManyAttempts => write!(f, "too many attempts"),
            AuthError::InvalidResetToken => write!(f, "invalid reset token"),
            AuthError::InvalidVerifyToken => write!(f, "invalid verification token"),
            AuthError::EmailNotVerified => write!(f, "email not verified"),
            AuthError::MailNotConfigured => write!(f, "mail not configured"),
            AuthError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl From<CacheError> for AuthError {
    fn from(e: CacheError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl From<HashError> for AuthError {
    fn from(e: HashError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

/// Token pair returned by the credential-bearing flows. The refresh
/// token is intended for a side channel (HttpOnly cookie), not the
/// response body.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token expiry (Unix seconds).
    pub expires_at: u64,
}

/// Composes the credential verifier, the token stores, and the
/// admission guards into the account flows.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    mailer: Option<Arc<dyn MailSender>>,
    jwt: JwtConfig,
    refresh_tokens: OpaqueTokenStore,
    reset_tokens: OpaqueTokenStore,
    verify_tokens: OpaqueTokenStore,
    login_guard: LoginAttemptGuard,
    bcrypt_cost: u32,
    public_url: String,
    require_verified_email: bool,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        cache: Arc<dyn TtlCache>,
        mailer: Option<Arc<dyn MailSender>>,
        cfg: &AuthConfig,
    ) -> Self {
        Self {
            users,
            mailer,
            jwt: JwtConfig::new(
                cfg.jwt_secret.as_bytes(),
                cfg.access_token_ttl,
                &cfg.access_token_issuer,
            ),
            refresh_tokens: OpaqueTokenStore::new(
                cache.clone(),
                &cfg.refresh_token_secret,
                cfg.refresh_token_ttl,
                REFRESH_TOKEN_PREFIX,
            ),
            reset_tokens: OpaqueTokenStore::new(
                cache.clone(),
                &cfg.password_reset_secret,
                cfg.password_reset_ttl,
                PASSWORD_RESET_PREFIX,
            ),
            verify_tokens: OpaqueTokenStore::new(
                cache.clone(),
                &cfg.verify_email_secret,
                cfg.verify_email_ttl,
                VERIFY_EMAIL_PREFIX,
            ),
            login_guard: LoginAttemptGuard::new(
                cache,
                cfg.login_attempt_window,
                cfg.login_lock_ttl,
                cfg.login_max_attempts,
            ),
            bcrypt_cost: cfg.bcrypt_cost,
            public_url: cfg.public_url.trim_end_matches('/').to_string(),
            require_verified_email: cfg.require_verified_email,
        }
    }

    /// Create an account and sign it in. Sends a verification email
    /// when a mailer is configured; a delivery failure is logged and
    /// does not fail the registration.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, AuthTokens), AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput("email and password are required"));
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidInput("invalid email address"));
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::InvalidInput(
                "password must be at least 8 characters",
            ));
        }

        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailExists);
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            password_hash: password::hash(password, self.bcrypt_cost)?,
            role: DEFAULT_ROLE.to_string(),
            email_verified: false,
        };
        self.users.create(&user).await?;

        let tokens = self.issue_tokens(&user).await?;
        self.send_verification_email(&user).await;

        Ok((user, tokens))
    }

    /// Authenticate with email and password.
    ///
    /// An unknown identity behaves exactly like a wrong password: both
    /// count as failures against the lockout and both report
    /// `InvalidCredentials`.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, AuthTokens), AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        if self.login_guard.is_locked(&email).await? {
            return Err(AuthError::TooManyAttempts);
        }

        let user = match self.users.get_by_email(&email).await? {
            Some(user) => user,
            None => {
                self.login_guard.record_failure(&email).await?;
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !password::verify(&user.password_hash, password) {
            self.login_guard.record_failure(&email).await?;
            return Err(AuthError::InvalidCredentials);
        }

        if self.require_verified_email && !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        self.login_guard.reset(&email).await?;

        let tokens = self.issue_tokens(&user).await?;
        Ok((user, tokens))
    }

    /// Exchange a refresh token for a new token pair. The presented
    /// token is revoked only after its replacement exists, so a
    /// failure partway leaves the caller with a working token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(User, AuthTokens), AuthError> {
        let subject = match self.refresh_tokens.verify(refresh_token).await {
            Ok(subject) => subject,
            Err(TokenError::Invalid) => return Err(AuthError::InvalidCredentials),
            Err(TokenError::Cache(e)) => return Err(e.into()),
        };

        // Role may have changed since the token was issued.
        let user = self
            .users
            .get_by_id(&subject)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let tokens = self.issue_tokens(&user).await?;
        if let Err(e) = self.refresh_tokens.revoke(refresh_token).await {
            warn!(error = %e, "Failed to revoke rotated refresh token");
        }

        Ok((user, tokens))
    }

    /// Revoke a refresh token. Revoking an unknown or already-revoked
    /// token succeeds.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        match self.refresh_tokens.revoke(refresh_token).await {
            Ok(()) | Err(TokenError::Invalid) => Ok(()),
            Err(TokenError::Cache(e)) => Err(e.into()),
        }
    }

    /// Create a password-reset token and email it. An unknown identity
    /// succeeds with no observable effect.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AuthError::InvalidInput("email is required"));
        }
        let Some(mailer) = &self.mailer else {
            return Err(AuthError::MailNotConfigured);
        };

        let Some(user) = self.users.get_by_email(&email).await? else {
            return Ok(());
        };

        let token = match self.reset_tokens.create(&user.id).await {
            Ok(token) => token,
            Err(TokenError::Invalid) => return Err(AuthError::InvalidInput("invalid user")),
            Err(TokenError::Cache(e)) => return Err(e.into()),
        };

        let reset_url = format!("{}/reset-password?token={}", self.public_url, token);
        let text_body = format!("Reset your password using this link: {}", reset_url);
        let html_body = mail::render_reset_password(&reset_url);

        if let Err(e) = mailer
            .send(&user.email, "Reset your password", &text_body, &html_body)
            .await
        {
            // Do not leave an unusable, undelivered token alive.
            if let Err(revoke_err) = self.reset_tokens.revoke(&token).await {
                warn!(error = %revoke_err, "Failed to revoke undelivered reset token");
            }
            return Err(AuthError::Internal(e.to_string()));
        }

        Ok(())
    }

    /// Set a new password using a reset token. The token is single
    /// use; any verification failure reports `InvalidResetToken`.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), AuthError> {
        let token = token.trim();
        if token.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput("token and password are required"));
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::InvalidInput(
                "password must be at least 8 characters",
            ));
        }

        let subject = match self.reset_tokens.verify(token).await {
            Ok(subject) => subject,
            Err(TokenError::Invalid) => return Err(AuthError::InvalidResetToken),
            Err(TokenError::Cache(e)) => return Err(e.into()),
        };

        let user = self
            .users
            .get_by_id(&subject)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        let hash = password::hash(password, self.bcrypt_cost)?;
        self.users.update_password_hash(&user.id, &hash).await?;

        if let Err(e) = self.reset_tokens.revoke(token).await {
            warn!(error = %e, "Failed to revoke used reset token");
        }
        Ok(())
    }

    /// Mark an account's email address as confirmed using a
    /// verification token. The token is single use.
    pub async fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::InvalidInput("token is required"));
        }

        let subject = match self.verify_tokens.verify(token).await {
            Ok(subject) => subject,
            Err(TokenError::Invalid) => return Err(AuthError::InvalidVerifyToken),
            Err(TokenError::Cache(e)) => return Err(e.into()),
        };

        let user = self
            .users
            .get_by_id(&subject)
            .await?
            .ok_or(AuthError::InvalidVerifyToken)?;

        self.users.set_email_verified(&user.id).await?;

        if let Err(e) = self.verify_tokens.revoke(token).await {
            warn!(error = %e, "Failed to revoke used verification token");
        }
        Ok(())
    }

    /// Resolve a user by id, for protected endpoints.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.get_by_id(id).await?)
    }

    /// The access token codec, for request extractors.
    pub fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    async fn issue_tokens(&self, user: &User) -> Result<AuthTokens, AuthError> {
        let issued = self.jwt.issue(&user.id, &user.role)?;
        let refresh_token = match self.refresh_tokens.create(&user.id).await {
            Ok(token) => token,
            Err(TokenError::Invalid) => {
                return Err(AuthError::Internal("invalid token subject".to_string()));
            }
            Err(TokenError::Cache(e)) => return Err(e.into()),
        };

        Ok(AuthTokens {
            access_token: issued.token,
            refresh_token,
            token_type: "Bearer",
            expires_at: issued.expires_at,
        })
    }

    async fn send_verification_email(&self, user: &User) {
        let Some(mailer) = &self.mailer else {
            return;
        };

        let token = match self.verify_tokens.create(&user.id).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to create verification token");
                return;
            }
        };

        let verify_url = format!("{}/verify-email?token={}", self.public_url, token);
        let text_body = format!("Confirm your email address using this link: {}", verify_url);
        let html_body = mail::render_verify_email(&verify_url);

        if let Err(e) = mailer
            .send(&user.email, "Confirm your email", &text_body, &html_body)
            .await
        {
            warn!(error = %e, "Failed to send verification email");
            if let Err(revoke_err) = self.verify_tokens.revoke(&token).await {
                warn!(error = %revoke_err, "Failed to revoke undelivered verification token");
            }
        }
    }
}

/// Lower-case and trim an email address. All identity keying uses the
/// normalized form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
