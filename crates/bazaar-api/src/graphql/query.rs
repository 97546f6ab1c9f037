use async_graphql::{Context, ID, Object, Result, ResultExt};

use bazaar_db::models::ProjectFilter;

use super::objects::{PaymentSubscription, Project, ProjectFilterInput, User};
use super::{app_state, viewer};
use crate::{profiles, projects, subscriptions};

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Look a project up by its 4-digit public code.
    async fn project(&self, ctx: &Context<'_>, public_code: i64) -> Result<Option<Project>> {
        let row = projects::find_by_code(app_state(ctx), public_code).extend()?;
        Ok(row.map(Project))
    }

    /// The signed-in user, or null.
    async fn me(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        let row = profiles::me(app_state(ctx), viewer(ctx)).extend()?;
        Ok(row.map(User))
    }

    async fn users(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        let rows = profiles::list_users(app_state(ctx)).extend()?;
        Ok(rows.into_iter().map(User).collect())
    }

    /// Listings by subscribed owners.
    async fn projects(&self, ctx: &Context<'_>, filter: Option<ProjectFilterInput>) -> Result<Vec<Project>> {
        let filter: ProjectFilter = filter.unwrap_or_default().into();
        let rows = projects::list_projects(app_state(ctx), &filter).extend()?;
        Ok(rows.into_iter().map(Project).collect())
    }

    /// Admin only.
    async fn pending_subscriptions(&self, ctx: &Context<'_>) -> Result<Vec<PaymentSubscription>> {
        let rows = subscriptions::pending(app_state(ctx), viewer(ctx)).extend()?;
        Ok(rows.into_iter().map(PaymentSubscription).collect())
    }

    /// Public profile of a subscribed user.
    async fn user_profile(&self, ctx: &Context<'_>, id: ID) -> Result<User> {
        let row = profiles::user_profile(app_state(ctx), &id).extend()?;
        Ok(User(row))
    }
}
