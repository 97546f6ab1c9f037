use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::viewer::Viewer;

/// Follow `following_id` if the viewer doesn't already, unfollow otherwise.
/// Returns whether the viewer follows the target afterwards.
pub fn toggle_follow(state: &AppState, viewer: &Viewer, following_id: &str) -> ApiResult<bool> {
    let identity = viewer.require()?;

    if identity.id == following_id {
        return Err(ApiError::validation("You cannot follow yourself"));
    }
    if state.db.get_user_by_id(following_id)?.is_none() {
        return Err(ApiError::NotFound("User"));
    }

    let following = state.db.toggle_follow(&identity.id, following_id)?;
    debug!(follower = %identity.id, following = %following_id, now_following = following, "Follow toggled");
    Ok(following)
}

pub fn is_following(state: &AppState, viewer: &Viewer, target_id: &str) -> ApiResult<bool> {
    match viewer.identity() {
        Some(identity) => Ok(state.db.is_following(&identity.id, target_id)?),
        None => Ok(false),
    }
}
