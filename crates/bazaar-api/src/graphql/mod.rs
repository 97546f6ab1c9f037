//! GraphQL schema: one query root, one mutation root, no subscriptions.
//!
//! Resolvers read the shared [`AppState`] and the per-request [`Viewer`]
//! from the context and delegate to the service modules.

mod mutation;
mod objects;
mod query;

use async_graphql::{Context, EmptySubscription, Schema};

use crate::state::AppState;
use crate::viewer::Viewer;

pub use mutation::MutationRoot;
pub use objects::{AuthPayload, PaymentSubscription, Project, ProjectFilterInput, ProjectInput, Review, User};
pub use query::QueryRoot;

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(state: AppState) -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(state)
        .finish()
}

static ANONYMOUS: Viewer = Viewer::Anonymous;

pub(crate) fn app_state<'a>(ctx: &Context<'a>) -> &'a AppState {
    ctx.data_unchecked::<AppState>()
}

/// The request's viewer. Requests executed without one (tests, tooling)
/// count as anonymous.
pub(crate) fn viewer<'a>(ctx: &Context<'a>) -> &'a Viewer {
    ctx.data_opt::<Viewer>().unwrap_or(&ANONYMOUS)
}
