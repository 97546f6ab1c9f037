use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Duration;

use bazaar_api::state::Settings;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

/// Upper bound on any configured lifetime, in days.
const MAX_DAYS: i64 = 36_500;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub session_ttl_days: i64,
    pub subscription_days: i64,
    pub admin_emails: String,
    pub cookie_secure: bool,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,
    pub post_login_redirect: String,
}

/// Error for a secret that is unset or still set to an example value.
#[derive(Debug, thiserror::Error)]
#[error("BAZAAR_JWT_SECRET is unset or still a placeholder")]
pub struct PlaceholderSecret;

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("BAZAAR_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(PlaceholderSecret.into());
        }

        Ok(Self {
            host: var("BAZAAR_HOST", "0.0.0.0"),
            port: parse(&get, "BAZAAR_PORT", 4000)?,
            db_path: var("BAZAAR_DB_PATH", "bazaar.db").into(),
            jwt_secret,
            token_ttl_days: days(&get, "BAZAAR_TOKEN_TTL_DAYS")?,
            session_ttl_days: days(&get, "BAZAAR_SESSION_TTL_DAYS")?,
            subscription_days: days(&get, "BAZAAR_SUBSCRIPTION_DAYS")?,
            admin_emails: var("BAZAAR_ADMIN_EMAILS", ""),
            cookie_secure: parse(&get, "BAZAAR_COOKIE_SECURE", true)?,
            google_client_id: var("GOOGLE_CLIENT_ID", ""),
            google_client_secret: var("GOOGLE_CLIENT_SECRET", ""),
            google_redirect_uri: var("GOOGLE_REDIRECT_URI", "http://localhost:4000/auth/callback/google"),
            post_login_redirect: var("BAZAAR_POST_LOGIN_REDIRECT", "/"),
        })
    }

    pub fn settings(&self) -> Settings {
        Settings {
            jwt_secret: self.jwt_secret.clone(),
            token_ttl: Duration::days(self.token_ttl_days),
            session_ttl: Duration::days(self.session_ttl_days),
            subscription_period: Duration::days(self.subscription_days),
            cookie_secure: self.cookie_secure,
            post_login_redirect: self.post_login_redirect.clone(),
        }
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("Invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn days(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<i64> {
    let days: i64 = parse(get, key, 30)?;
    if days <= 0 {
        bail!("{key} must be positive, got {days}");
    }
    if days > MAX_DAYS {
        bail!("{key} must be at most {MAX_DAYS}, got {days}");
    }
    Ok(days)
}
