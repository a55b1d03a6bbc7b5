//! Server-side token state: opaque single-use tokens, the windowed
//! counter primitive, and the login-attempt guard. Everything here is
//! backed by the shared TTL cache.

mod counter;
mod login_attempt;
mod opaque;

pub use counter::WindowedCounter;
pub use login_attempt::LoginAttemptGuard;
pub use opaque::{OpaqueTokenStore, TokenError};

/// Key prefix for refresh tokens.
pub const REFRESH_TOKEN_PREFIX: &str = "refresh:";

/// Key prefix for password-reset tokens.
pub const PASSWORD_RESET_PREFIX: &str = "pwdreset:";

/// Key prefix for email-verification tokens.
pub const VERIFY_EMAIL_PREFIX: &str = "verify:";
