use std::sync::Arc;

use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::{
        Method, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE},
    },
    middleware,
    response::Redirect,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use bazaar_types::api::{GoogleCallbackQuery, SessionResponse, SessionUser, SignInRequest, SignInResponse};

use crate::auth::{
    self, PresentedSession, SESSION_COOKIE, hash_session_token, new_session_token, session_cookie, session_removal_cookie,
};
use crate::error::{ApiError, ApiResult};
use crate::google::sign_in_with_google;
use crate::graphql::{AppSchema, build_schema};
use crate::middleware::{IdentityChain, resolve_viewer};
use crate::profiles;
use crate::state::AppState;
use crate::viewer::Viewer;

pub const OAUTH_STATE_COOKIE: &str = "bazaar_oauth_state";

/// The full HTTP surface: `/graphql`, the `/auth/*` family and `/health`.
pub fn router(state: AppState) -> Router {
    let chain = Arc::new(IdentityChain::standard(state.clone()));

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, COOKIE])
        .allow_credentials(true);

    let graphql_routes = Router::new()
        .route("/graphql", get(graphql_handler).post(graphql_handler))
        .with_state(build_schema(state.clone()));

    let auth_routes = Router::new()
        .route("/auth/session", get(session))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signout", post(sign_out))
        .route("/auth/signin/google", get(google_sign_in))
        .route("/auth/callback/google", get(google_callback))
        .with_state(state);

    Router::new()
        .merge(graphql_routes)
        .merge(auth_routes)
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(chain, resolve_viewer))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn graphql_handler(
    State(schema): State<AppSchema>,
    Extension(viewer): Extension<Viewer>,
    jar: CookieJar,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let mut req = req.into_inner().data(viewer);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        req = req.data(PresentedSession(hash_session_token(cookie.value())));
    }
    schema.execute(req).await.into()
}

async fn health() -> &'static str {
    "ok"
}

async fn session(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> ApiResult<Json<SessionResponse>> {
    let user = profiles::me(&state, &viewer)?.map(|u| SessionUser {
        id: u.id,
        email: u.email,
        is_subscribed: u.is_subscribed,
    });
    Ok(Json(SessionResponse { user }))
}

/// Email/password sign-in for browser clients: sets the session cookie and
/// also returns a bearer token.
async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignInRequest>,
) -> ApiResult<(CookieJar, Json<SignInResponse>)> {
    let user = auth::authenticate(&state, &req.email, &req.password).await?;
    let session = auth::start_session(&state, &user.id)?;
    let token = auth::create_token(&state.settings, &user)?;

    info!("{} signed in with a session", user.id);

    let jar = jar.add(session_cookie(session, state.settings.cookie_secure));
    Ok((
        jar,
        Json(SignInResponse {
            user_id: user.id,
            email: user.email,
            token,
        }),
    ))
}

async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> ApiResult<(CookieJar, StatusCode)> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        auth::end_session(&state, &hash_session_token(cookie.value()))?;
    }
    Ok((jar.add(session_removal_cookie()), StatusCode::NO_CONTENT))
}

/// Start the browser OAuth flow: remember a random `state` in a cookie and
/// send the user to Google's consent screen.
async fn google_sign_in(State(state): State<AppState>, jar: CookieJar) -> ApiResult<(CookieJar, Redirect)> {
    let csrf = new_session_token();
    let url = state
        .google
        .authorize_url(&csrf)
        .ok_or_else(|| ApiError::Upstream("Google sign-in is not configured".into()))?;

    let cookie = Cookie::build((OAUTH_STATE_COOKIE, csrf))
        .path("/auth")
        .http_only(true)
        .secure(state.settings.cookie_secure)
        .same_site(SameSite::Lax)
        .build();

    Ok((jar.add(cookie), Redirect::to(&url)))
}

async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<GoogleCallbackQuery>,
) -> ApiResult<(CookieJar, Redirect)> {
    if let Some(error) = query.error {
        warn!("Google sign-in aborted: {}", error);
        return Err(ApiError::Upstream(format!("Google returned {error}")));
    }

    let expected = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    match (expected, query.state) {
        (Some(expected), Some(got)) if !expected.is_empty() && expected == got => {}
        _ => return Err(ApiError::validation("OAuth state mismatch")),
    }

    let code = query.code.ok_or_else(|| ApiError::validation("Missing authorization code"))?;
    let id_token = state.google.exchange_code(&code).await?;
    let google = state.google.verify_id_token(&id_token).await?;
    let user = sign_in_with_google(&state, google)?;
    let session = auth::start_session(&state, &user.id)?;

    info!("{} signed in with Google", user.id);

    let mut state_removal = Cookie::build((OAUTH_STATE_COOKIE, "")).path("/auth").build();
    state_removal.make_removal();

    let jar = jar
        .add(state_removal)
        .add(session_cookie(session, state.settings.cookie_secure));
    Ok((jar, Redirect::to(&state.settings.post_login_redirect)))
}
