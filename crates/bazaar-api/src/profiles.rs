use tracing::info;

use bazaar_db::models::UserRow;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::viewer::Viewer;

const MAX_WHATSAPP_LEN: usize = 32;

/// The viewer's own account, re-read from storage so the subscribed flag is
/// current even when the bearer token predates an approval.
pub fn me(state: &AppState, viewer: &Viewer) -> ApiResult<Option<UserRow>> {
    match viewer.identity() {
        Some(identity) => Ok(state.db.get_user_by_id(&identity.id)?),
        None => Ok(None),
    }
}

pub fn list_users(state: &AppState) -> ApiResult<Vec<UserRow>> {
    Ok(state.db.list_users()?)
}

/// Public profile page. Only subscribed users have one.
pub fn user_profile(state: &AppState, user_id: &str) -> ApiResult<UserRow> {
    state
        .db
        .get_user_by_id(user_id)?
        .filter(|u| u.is_subscribed)
        .ok_or(ApiError::NotFound("User"))
}

/// Digits with an optional leading `+`; spaces, dashes and parentheses are
/// stripped first.
pub fn normalize_whatsapp(raw: &str) -> ApiResult<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::validation("WhatsApp number must contain only digits"));
    }
    if compact.len() > MAX_WHATSAPP_LEN {
        return Err(ApiError::validation("WhatsApp number is too long"));
    }
    Ok(compact)
}

pub fn update_whatsapp(state: &AppState, viewer: &Viewer, raw: &str) -> ApiResult<UserRow> {
    let identity = viewer.require()?;
    let number = normalize_whatsapp(raw)?;

    let user = state
        .db
        .set_whatsapp_number(&identity.id, &number)?
        .ok_or(ApiError::NotFound("User"))?;

    info!("{} updated their WhatsApp number", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whatsapp_numbers_are_compacted() {
        assert_eq!(normalize_whatsapp("+1 (555) 010-0000").unwrap(), "+15550100000");
        assert_eq!(normalize_whatsapp("0612345678").unwrap(), "0612345678");
    }

    #[test]
    fn whatsapp_rejects_letters_and_empty() {
        assert!(normalize_whatsapp("call me").is_err());
        assert!(normalize_whatsapp("+").is_err());
        assert!(normalize_whatsapp("").is_err());
        assert!(normalize_whatsapp(&"1".repeat(40)).is_err());
    }
}
