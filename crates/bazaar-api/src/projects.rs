use tracing::info;
use uuid::Uuid;

use bazaar_db::models::{NewProject, ProjectFilter, ProjectRow};
use bazaar_db::{PublicCodeExhausted, random_public_code};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::viewer::Viewer;

const MAX_TITLE_LEN: usize = 200;

/// Fields a caller supplies for a new listing.
#[derive(Debug, Clone, Default)]
pub struct ProjectDraft {
    pub title: String,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub category: Option<String>,
    pub place: Option<String>,
    pub price: Option<f64>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn create_project(state: &AppState, viewer: &Viewer, draft: ProjectDraft) -> ApiResult<ProjectRow> {
    create_project_with(state, viewer, draft, random_public_code)
}

/// Like [`create_project`] but with an explicit public code source.
pub fn create_project_with(
    state: &AppState,
    viewer: &Viewer,
    draft: ProjectDraft,
    next_code: impl FnMut() -> i64,
) -> ApiResult<ProjectRow> {
    let identity = viewer.require()?;

    let title = draft.title.trim();
    if title.is_empty() {
        return Err(ApiError::validation("Title must not be empty"));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(ApiError::validation("Title is too long"));
    }
    if let Some(price) = draft.price {
        if !price.is_finite() || price < 0.0 {
            return Err(ApiError::validation("Price must be a non-negative number"));
        }
    }

    // Bearer tokens outlive deleted accounts.
    if state.db.get_user_by_id(&identity.id)?.is_none() {
        return Err(ApiError::Unauthorized);
    }

    let project = NewProject {
        owner_id: identity.id.clone(),
        title: title.to_string(),
        description: trimmed(draft.description),
        media_url: trimmed(draft.media_url),
        category: trimmed(draft.category),
        place: trimmed(draft.place),
        price: draft.price,
    };

    let id = Uuid::new_v4().to_string();
    let row = state.db.create_project(&id, &project, next_code).map_err(|e| {
        if e.downcast_ref::<PublicCodeExhausted>().is_some() {
            ApiError::PublicCodeExhausted
        } else {
            ApiError::Internal(e)
        }
    })?;

    info!("Project {} created by {} with code {}", row.id, row.owner_id, row.public_code);
    Ok(row)
}

pub fn find_by_code(state: &AppState, public_code: i64) -> ApiResult<Option<ProjectRow>> {
    Ok(state.db.get_project_by_code(public_code)?)
}

/// Listings from subscribed owners matching every supplied filter field.
pub fn list_projects(state: &AppState, filter: &ProjectFilter) -> ApiResult<Vec<ProjectRow>> {
    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
        if min > max {
            return Err(ApiError::validation("minPrice must not exceed maxPrice"));
        }
    }
    Ok(state.db.list_projects(filter)?)
}

pub fn projects_of(state: &AppState, owner_id: &str) -> ApiResult<Vec<ProjectRow>> {
    Ok(state.db.list_projects_by_owner(owner_id)?)
}
