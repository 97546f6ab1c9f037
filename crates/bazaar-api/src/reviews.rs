use tracing::info;
use uuid::Uuid;

use bazaar_db::models::{NewReview, ReviewRow};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::viewer::Viewer;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;
const MAX_COMMENT_LEN: usize = 2000;

/// Rate a project. The review also counts towards the project owner's
/// received reviews.
pub fn rate_project(
    state: &AppState,
    viewer: &Viewer,
    project_id: &str,
    rating: i64,
    comment: Option<String>,
) -> ApiResult<ReviewRow> {
    let identity = viewer.require()?;

    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(ApiError::validation(format!(
            "Rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }

    let comment = comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    if comment.as_ref().is_some_and(|c| c.len() > MAX_COMMENT_LEN) {
        return Err(ApiError::validation("Comment is too long"));
    }

    let project = state
        .db
        .get_project_by_id(project_id)?
        .ok_or(ApiError::NotFound("Project"))?;

    if project.owner_id == identity.id {
        return Err(ApiError::validation("You cannot rate your own project"));
    }

    let review = NewReview {
        user_id: identity.id.clone(),
        project_id: Some(project.id),
        target_user_id: Some(project.owner_id),
        rating,
        comment,
    };

    let row = state.db.create_review(&Uuid::new_v4().to_string(), &review)?;
    info!("{} rated project {} with {}", row.user_id, project_id, row.rating);
    Ok(row)
}

pub fn reviews_for_project(state: &AppState, project_id: &str) -> ApiResult<Vec<ReviewRow>> {
    Ok(state.db.reviews_for_project(project_id)?)
}

pub fn reviews_received(state: &AppState, user_id: &str) -> ApiResult<Vec<ReviewRow>> {
    Ok(state.db.reviews_for_user(user_id)?)
}
