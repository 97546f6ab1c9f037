use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};

use bazaar_db::Database;

use crate::error::{ApiError, ApiResult};
use crate::google::GoogleVerifier;
use crate::policy::AdminPolicy;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub settings: Settings,
    pub admin: Arc<dyn AdminPolicy>,
    pub google: Arc<dyn GoogleVerifier>,
}

/// Runtime knobs that are not secrets of a third party.
#[derive(Debug, Clone)]
pub struct Settings {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub session_ttl: Duration,
    /// How long an approved subscription lasts.
    pub subscription_period: Duration,
    pub cookie_secure: bool,
    pub post_login_redirect: String,
}

impl Settings {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl: Duration::days(30),
            session_ttl: Duration::days(30),
            subscription_period: Duration::days(30),
            cookie_secure: true,
            post_login_redirect: "/".into(),
        }
    }
}

/// Unix timestamp `ttl` after `from`; an out-of-range result is an internal error.
pub fn deadline(from: DateTime<Utc>, ttl: Duration) -> ApiResult<i64> {
    from.checked_add_signed(ttl)
        .map(|at| at.timestamp())
        .ok_or_else(|| ApiError::Internal(anyhow!("Deadline overflow: {} + {}", from, ttl)))
}
