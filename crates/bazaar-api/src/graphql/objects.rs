use async_graphql::{Context, Enum, ID, InputObject, Object, Result, ResultExt, SimpleObject};

use bazaar_db::models::{ProjectFilter, ProjectRow, ReviewRow, SubscriptionRow, UserRow};
use bazaar_types::models::SubscriptionStatus as StoredStatus;

use super::{app_state, viewer};
use crate::error::internal;
use crate::projects::ProjectDraft;
use crate::viewer::redact_contact;
use crate::{follows, projects, reviews};

fn rfc3339(ts: i64) -> Option<String> {
    chrono::DateTime::from_timestamp(ts, 0).map(|d| d.to_rfc3339())
}

// -- User --

pub struct User(pub UserRow);

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self(row)
    }
}

#[Object]
impl User {
    async fn id(&self) -> ID {
        ID(self.0.id.clone())
    }

    async fn email(&self) -> &str {
        &self.0.email
    }

    async fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    async fn image(&self) -> Option<&str> {
        self.0.image.as_deref()
    }

    async fn google_id(&self) -> Option<&str> {
        self.0.google_id.as_deref()
    }

    /// The owner and subscribed viewers see the number; everyone else gets
    /// `"Locked"`.
    async fn whatsapp_number(&self, ctx: &Context<'_>) -> Option<String> {
        redact_contact(viewer(ctx), &self.0.id, self.0.whatsapp_number.as_deref())
    }

    async fn is_subscribed(&self) -> bool {
        self.0.is_subscribed
    }

    /// RFC 3339.
    async fn subscription_end(&self) -> Option<String> {
        self.0.subscription_end.and_then(rfc3339)
    }

    async fn created_at(&self) -> &str {
        &self.0.created_at
    }

    async fn projects(&self, ctx: &Context<'_>) -> Result<Vec<Project>> {
        let rows = projects::projects_of(app_state(ctx), &self.0.id).extend()?;
        Ok(rows.into_iter().map(Project).collect())
    }

    /// Reviews other users left on this user's projects.
    async fn reviews(&self, ctx: &Context<'_>) -> Result<Vec<Review>> {
        let rows = reviews::reviews_received(app_state(ctx), &self.0.id).extend()?;
        Ok(rows.into_iter().map(Review).collect())
    }

    async fn followers_count(&self, ctx: &Context<'_>) -> Result<i64> {
        app_state(ctx).db.count_followers(&self.0.id).map_err(internal)
    }

    async fn following_count(&self, ctx: &Context<'_>) -> Result<i64> {
        app_state(ctx).db.count_following(&self.0.id).map_err(internal)
    }

    async fn followed_by_viewer(&self, ctx: &Context<'_>) -> Result<bool> {
        follows::is_following(app_state(ctx), viewer(ctx), &self.0.id).extend()
    }
}

// -- Project --

pub struct Project(pub ProjectRow);

#[Object]
impl Project {
    async fn id(&self) -> ID {
        ID(self.0.id.clone())
    }

    async fn owner_id(&self) -> ID {
        ID(self.0.owner_id.clone())
    }

    async fn title(&self) -> &str {
        &self.0.title
    }

    async fn description(&self) -> Option<&str> {
        self.0.description.as_deref()
    }

    async fn public_code(&self) -> i64 {
        self.0.public_code
    }

    async fn media_url(&self) -> Option<&str> {
        self.0.media_url.as_deref()
    }

    async fn category(&self) -> Option<&str> {
        self.0.category.as_deref()
    }

    async fn place(&self) -> Option<&str> {
        self.0.place.as_deref()
    }

    async fn price(&self) -> Option<f64> {
        self.0.price
    }

    async fn created_at(&self) -> &str {
        &self.0.created_at
    }

    async fn owner(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        let owner = app_state(ctx).db.get_user_by_id(&self.0.owner_id).map_err(internal)?;
        Ok(owner.map(User))
    }

    async fn reviews(&self, ctx: &Context<'_>) -> Result<Vec<Review>> {
        let rows = reviews::reviews_for_project(app_state(ctx), &self.0.id).extend()?;
        Ok(rows.into_iter().map(Review).collect())
    }

    /// Mean rating, null while unrated.
    async fn average_rating(&self, ctx: &Context<'_>) -> Result<Option<f64>> {
        app_state(ctx).db.average_rating(&self.0.id).map_err(internal)
    }
}

// -- Review --

pub struct Review(pub ReviewRow);

#[Object]
impl Review {
    async fn id(&self) -> ID {
        ID(self.0.id.clone())
    }

    async fn user_id(&self) -> ID {
        ID(self.0.user_id.clone())
    }

    async fn project_id(&self) -> Option<ID> {
        self.0.project_id.clone().map(ID)
    }

    async fn target_user_id(&self) -> Option<ID> {
        self.0.target_user_id.clone().map(ID)
    }

    async fn rating(&self) -> i64 {
        self.0.rating
    }

    async fn comment(&self) -> Option<&str> {
        self.0.comment.as_deref()
    }

    async fn created_at(&self) -> &str {
        &self.0.created_at
    }

    async fn author(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        let author = app_state(ctx).db.get_user_by_id(&self.0.user_id).map_err(internal)?;
        Ok(author.map(User))
    }
}

// -- Subscription --

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum SubscriptionStatus {
    #[graphql(name = "Pending")]
    Pending,
    #[graphql(name = "Approved")]
    Approved,
}

impl From<StoredStatus> for SubscriptionStatus {
    fn from(status: StoredStatus) -> Self {
        match status {
            StoredStatus::Pending => SubscriptionStatus::Pending,
            StoredStatus::Approved => SubscriptionStatus::Approved,
        }
    }
}

/// A paid subscription request. `Subscription` is the operation root name
/// in GraphQL, hence the prefix.
pub struct PaymentSubscription(pub SubscriptionRow);

#[Object]
impl PaymentSubscription {
    async fn id(&self) -> ID {
        ID(self.0.id.clone())
    }

    async fn user_id(&self) -> ID {
        ID(self.0.user_id.clone())
    }

    async fn receipt_url(&self) -> &str {
        &self.0.receipt_url
    }

    async fn status(&self) -> SubscriptionStatus {
        self.0.status.into()
    }

    async fn created_at(&self) -> &str {
        &self.0.created_at
    }

    async fn user(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        let user = app_state(ctx).db.get_user_by_id(&self.0.user_id).map_err(internal)?;
        Ok(user.map(User))
    }
}

// -- Auth --

#[derive(SimpleObject)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

// -- Inputs --

#[derive(InputObject, Debug)]
pub struct ProjectInput {
    pub title: String,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub category: Option<String>,
    pub place: Option<String>,
    pub price: Option<f64>,
}

impl From<ProjectInput> for ProjectDraft {
    fn from(input: ProjectInput) -> Self {
        ProjectDraft {
            title: input.title,
            description: input.description,
            media_url: input.media_url,
            category: input.category,
            place: input.place,
            price: input.price,
        }
    }
}

#[derive(InputObject, Debug, Default)]
#[graphql(name = "ProjectFilter")]
pub struct ProjectFilterInput {
    pub category: Option<String>,
    pub place: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl From<ProjectFilterInput> for ProjectFilter {
    fn from(input: ProjectFilterInput) -> Self {
        ProjectFilter {
            category: input.category,
            place: input.place,
            min_price: input.min_price,
            max_price: input.max_price,
        }
    }
}
