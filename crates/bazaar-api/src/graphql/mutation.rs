use async_graphql::{Context, ID, Object, Result, ResultExt};
use axum::http::header::SET_COOKIE;

use super::objects::{AuthPayload, PaymentSubscription, Project, ProjectInput, Review, User};
use super::{app_state, viewer};
use crate::auth::{self, PresentedSession, session_removal_cookie};
use crate::{follows, google, profiles, projects, reviews, subscriptions};

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn sign_up(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
        name: Option<String>,
    ) -> Result<AuthPayload> {
        let (token, user) = auth::sign_up(app_state(ctx), &email, &password, name).await.extend()?;
        Ok(AuthPayload { token, user: User(user) })
    }

    async fn login(&self, ctx: &Context<'_>, email: String, password: String) -> Result<AuthPayload> {
        let (token, user) = auth::login(app_state(ctx), &email, &password).await.extend()?;
        Ok(AuthPayload { token, user: User(user) })
    }

    /// Ends any cookie session the request carries and clears the cookie.
    async fn logout(&self, ctx: &Context<'_>) -> Result<bool> {
        let identity = viewer(ctx).require().extend()?;
        let presented = ctx.data_opt::<PresentedSession>();
        let done = auth::logout(app_state(ctx), identity, presented).extend()?;
        ctx.append_http_header(SET_COOKIE, session_removal_cookie().to_string());
        Ok(done)
    }

    /// Sign in with a Google ID token obtained by the client.
    async fn auth_google(&self, ctx: &Context<'_>, id_token: String) -> Result<AuthPayload> {
        let (token, user) = google::auth_google(app_state(ctx), &id_token).await.extend()?;
        Ok(AuthPayload { token, user: User(user) })
    }

    async fn subscribe(&self, ctx: &Context<'_>, receipt_url: String) -> Result<PaymentSubscription> {
        let row = subscriptions::subscribe(app_state(ctx), viewer(ctx), &receipt_url).extend()?;
        Ok(PaymentSubscription(row))
    }

    /// Toggle; returns whether the viewer now follows the user.
    async fn follow_user(&self, ctx: &Context<'_>, following_id: ID) -> Result<bool> {
        follows::toggle_follow(app_state(ctx), viewer(ctx), &following_id).extend()
    }

    async fn create_project(&self, ctx: &Context<'_>, input: ProjectInput) -> Result<Project> {
        let row = projects::create_project(app_state(ctx), viewer(ctx), input.into()).extend()?;
        Ok(Project(row))
    }

    async fn update_profile(&self, ctx: &Context<'_>, whatsapp_number: String) -> Result<User> {
        let row = profiles::update_whatsapp(app_state(ctx), viewer(ctx), &whatsapp_number).extend()?;
        Ok(User(row))
    }

    async fn rate_project(
        &self,
        ctx: &Context<'_>,
        project_id: ID,
        rating: i64,
        comment: Option<String>,
    ) -> Result<Review> {
        let row = reviews::rate_project(app_state(ctx), viewer(ctx), &project_id, rating, comment).extend()?;
        Ok(Review(row))
    }

    /// Admin only.
    async fn approve_subscription(&self, ctx: &Context<'_>, id: ID) -> Result<PaymentSubscription> {
        let row = subscriptions::approve(app_state(ctx), viewer(ctx), &id).extend()?;
        Ok(PaymentSubscription(row))
    }
}
