use tracing::info;
use uuid::Uuid;

use bazaar_db::models::SubscriptionRow;

use crate::error::{ApiError, ApiResult};
use crate::policy::require_admin;
use crate::state::{AppState, deadline};
use crate::viewer::Viewer;

const MAX_RECEIPT_URL_LEN: usize = 2048;

fn validate_receipt_url(raw: &str) -> ApiResult<String> {
    let url = raw.trim();
    if url.len() > MAX_RECEIPT_URL_LEN {
        return Err(ApiError::validation("Receipt URL is too long"));
    }

    let parsed = reqwest::Url::parse(url).map_err(|_| ApiError::validation("Receipt URL is not a valid URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::validation("Receipt URL must be http or https"));
    }
    Ok(url.to_string())
}

/// Submit a payment receipt for review. Starts out `Pending`.
pub fn subscribe(state: &AppState, viewer: &Viewer, receipt_url: &str) -> ApiResult<SubscriptionRow> {
    let identity = viewer.require()?;
    let receipt_url = validate_receipt_url(receipt_url)?;

    if state.db.get_user_by_id(&identity.id)?.is_none() {
        return Err(ApiError::Unauthorized);
    }

    let sub = state
        .db
        .create_subscription(&Uuid::new_v4().to_string(), &identity.id, &receipt_url)?;

    info!("Subscription {} submitted by {}", sub.id, sub.user_id);
    Ok(sub)
}

/// Admin: approve a subscription and mark its owner subscribed for one
/// subscription period from now.
pub fn approve(state: &AppState, viewer: &Viewer, id: &str) -> ApiResult<SubscriptionRow> {
    let admin = require_admin(state.admin.as_ref(), viewer)?;

    let end = deadline(chrono::Utc::now(), state.settings.subscription_period)?;
    let sub = state
        .db
        .approve_subscription(id, end)?
        .ok_or(ApiError::NotFound("Subscription"))?;

    info!("Subscription {} for {} approved by {}", sub.id, sub.user_id, admin.email);
    Ok(sub)
}

pub fn pending(state: &AppState, viewer: &Viewer) -> ApiResult<Vec<SubscriptionRow>> {
    require_admin(state.admin.as_ref(), viewer)?;
    Ok(state.db.list_pending_subscriptions()?)
}
