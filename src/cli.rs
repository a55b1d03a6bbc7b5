//! CLI argument parsing, validation, and startup helpers.

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

use crate::ServerConfig;
use crate::cache::{MemoryCache, RedisCache, TtlCache};
use crate::db::{Database, MemoryUserStore, UserStore};
use crate::mail::{HttpMailer, LogMailer, MailSender};
use crate::password;
use crate::rate_limit::RateLimitSettings;
use crate::service::AuthConfig;

const MIN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "reverb", about = "Authentication and token lifecycle service")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "PORT")]
    pub port: u16,

    /// Postgres connection URL. Without one, users are kept in process
    /// memory (local development only)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Redis connection URL. Without one, token state and counters are
    /// kept in process memory (local development only)
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Public base URL embedded in emailed links
    #[arg(long, default_value = "http://localhost:3000", env = "PUBLIC_URL")]
    pub public_url: String,

    /// Issuer claim stamped into and required of access tokens
    #[arg(long, default_value = "reverb", env = "TOKEN_ISSUER")]
    pub token_issuer: String,

    /// Access token lifetime in seconds
    #[arg(long, default_value = "900")]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value = "604800")]
    pub refresh_token_ttl: u64,

    /// Password-reset token lifetime in seconds
    #[arg(long, default_value = "1800")]
    pub password_reset_ttl: u64,

    /// Email-verification token lifetime in seconds
    #[arg(long, default_value = "86400")]
    pub verify_email_ttl: u64,

    /// Window for counting failed logins, in seconds
    #[arg(long, default_value = "600")]
    pub login_attempt_window: u64,

    /// Lockout duration after too many failed logins, in seconds
    #[arg(long, default_value = "900")]
    pub login_lock_ttl: u64,

    /// Failed logins per identity before lockout
    #[arg(long, default_value = "10")]
    pub login_max_attempts: i64,

    /// Requests per IP per window, all endpoints
    #[arg(long, default_value = "100")]
    pub global_rate_max: i64,

    /// Global rate window in seconds
    #[arg(long, default_value = "60")]
    pub global_rate_window: u64,

    /// Login requests per IP per window
    #[arg(long, default_value = "5")]
    pub login_rate_max: i64,

    /// Login rate window in seconds
    #[arg(long, default_value = "60")]
    pub login_rate_window: u64,

    /// Reject logins from accounts that have not confirmed their email
    #[arg(long)]
    pub require_verified_email: bool,

    /// HTTP mail API endpoint. Mail flows are disabled without one
    #[arg(long, env = "MAIL_ENDPOINT")]
    pub mail_endpoint: Option<String>,

    /// From address for outbound mail
    #[arg(long, env = "MAIL_FROM")]
    pub mail_from: Option<String>,

    /// Log outbound mail instead of sending it (local development)
    #[arg(long)]
    pub log_mail: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// The four signing secrets, each configured independently so a leaked
/// secret for one purpose cannot forge tokens for another.
pub struct Secrets {
    pub jwt: String,
    pub refresh: String,
    pub password_reset: String,
    pub verify_email: String,
}

/// Load all signing secrets from the environment. Returns None and
/// logs an error if any is missing or too short.
pub fn load_secrets() -> Option<Secrets> {
    Some(Secrets {
        jwt: load_secret("JWT_SECRET")?,
        refresh: load_secret("REFRESH_TOKEN_SECRET")?,
        password_reset: load_secret("PASSWORD_RESET_SECRET")?,
        verify_email: load_secret("VERIFY_EMAIL_SECRET")?,
    })
}

/// Load one secret from the environment, clearing the variable so it
/// cannot leak into child processes.
fn load_secret(name: &str) -> Option<String> {
    let Ok(secret) = std::env::var(name) else {
        error!("{} is required", name);
        return None;
    };

    // SAFETY: We're single-threaded at this point during startup,
    // and no other code is reading this environment variable.
    unsafe { std::env::remove_var(name) };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            name, MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Build ServerConfig from validated arguments and secrets.
pub fn build_config(args: &Args, secrets: Secrets) -> ServerConfig {
    let secure_cookies = args.public_url.starts_with("https://");

    ServerConfig {
        auth: AuthConfig {
            jwt_secret: secrets.jwt,
            access_token_ttl: Duration::from_secs(args.access_token_ttl),
            access_token_issuer: args.token_issuer.clone(),
            refresh_token_secret: secrets.refresh,
            refresh_token_ttl: Duration::from_secs(args.refresh_token_ttl),
            password_reset_secret: secrets.password_reset,
            password_reset_ttl: Duration::from_secs(args.password_reset_ttl),
            verify_email_secret: secrets.verify_email,
            verify_email_ttl: Duration::from_secs(args.verify_email_ttl),
            login_attempt_window: Duration::from_secs(args.login_attempt_window),
            login_lock_ttl: Duration::from_secs(args.login_lock_ttl),
            login_max_attempts: args.login_max_attempts,
            bcrypt_cost: password::DEFAULT_COST,
            public_url: args.public_url.clone(),
            require_verified_email: args.require_verified_email,
        },
        rate_limit: RateLimitSettings {
            global_max: args.global_rate_max,
            global_window: Duration::from_secs(args.global_rate_window),
            login_max: args.login_rate_max,
            login_window: Duration::from_secs(args.login_rate_window),
        },
        secure_cookies,
    }
}

/// Connect the user store: Postgres when configured, otherwise the
/// in-memory store. Returns None and logs an error on failure.
pub async fn open_user_store(database_url: Option<&str>) -> Option<Arc<dyn UserStore>> {
    match database_url {
        Some(url) => match Database::open(url).await {
            Ok(db) => {
                info!("Database connected");
                Some(Arc::new(db.users()))
            }
            Err(e) => {
                error!(error = %e, "Failed to open database");
                None
            }
        },
        None => {
            warn!("No DATABASE_URL set; using in-memory user store");
            Some(Arc::new(MemoryUserStore::new()))
        }
    }
}

/// Connect the TTL cache: Redis when configured, otherwise the
/// in-memory cache. Returns None and logs an error on failure.
pub async fn open_cache(redis_url: Option<&str>) -> Option<Arc<dyn TtlCache>> {
    match redis_url {
        Some(url) => match RedisCache::connect(url).await {
            Ok(cache) => {
                info!("Redis connected");
                Some(Arc::new(cache))
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to Redis");
                None
            }
        },
        None => {
            warn!("No REDIS_URL set; using in-memory cache");
            Some(Arc::new(MemoryCache::new()))
        }
    }
}

/// Build the mail sender from arguments. `Ok(None)` means mail is not
/// configured; the mail-dependent flows will report that.
pub fn build_mailer(args: &Args) -> Result<Option<Arc<dyn MailSender>>, String> {
    if args.log_mail {
        return Ok(Some(Arc::new(LogMailer)));
    }

    let (Some(endpoint), Some(from)) = (&args.mail_endpoint, &args.mail_from) else {
        return Ok(None);
    };

    let endpoint =
        Url::parse(endpoint).map_err(|e| format!("Invalid mail endpoint URL: {}", e))?;
    let api_key =
        std::env::var("MAIL_API_KEY").map_err(|_| "MAIL_API_KEY is required".to_string())?;
    // SAFETY: We're single-threaded at this point during startup,
    // and no other code is reading this environment variable.
    unsafe { std::env::remove_var("MAIL_API_KEY") };

    Ok(Some(Arc::new(HttpMailer::new(endpoint, &api_key, from))))
}
