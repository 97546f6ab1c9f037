use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};

use crate::auth::{SESSION_COOKIE, decode_token, hash_session_token};
use crate::state::AppState;
use crate::viewer::{Identity, IdentitySource, Viewer};

/// One way of recognising the caller. Returns `None` when the request does
/// not carry this kind of credential or the credential does not check out;
/// a provider never fails the request.
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn resolve(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// `Authorization: Bearer <jwt>`. Claims are trusted without a storage
/// lookup until the token expires.
pub struct BearerTokenProvider {
    secret: String,
}

impl BearerTokenProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }
}

impl IdentityProvider for BearerTokenProvider {
    fn name(&self) -> &'static str {
        "bearer"
    }

    fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))?;

        match decode_token(&self.secret, token.trim()) {
            Ok(claims) => Some(claims.into()),
            Err(e) => {
                debug!("Ignoring bearer token: {}", e);
                None
            }
        }
    }
}

/// Session cookie issued by the `/auth/*` routes, looked up in storage on
/// every request.
pub struct SessionCookieProvider {
    state: AppState,
}

impl SessionCookieProvider {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl IdentityProvider for SessionCookieProvider {
    fn name(&self) -> &'static str {
        "session"
    }

    fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        let jar = CookieJar::from_headers(headers);
        let token = jar.get(SESSION_COOKIE)?.value();
        if token.is_empty() {
            return None;
        }

        let token_hash = hash_session_token(token);
        let now = chrono::Utc::now().timestamp();
        match self.state.db.get_session_user(&token_hash, now) {
            Ok(Some(user)) => Some(Identity {
                id: user.id,
                email: user.email,
                is_subscribed: user.is_subscribed,
                source: IdentitySource::Session { token_hash },
            }),
            Ok(None) => {
                debug!("Unknown or expired session cookie");
                None
            }
            Err(e) => {
                warn!("Session lookup failed: {:#}", e);
                None
            }
        }
    }
}

/// Ordered providers; the first one that resolves wins.
pub struct IdentityChain {
    providers: Vec<Box<dyn IdentityProvider>>,
}

impl IdentityChain {
    pub fn new(providers: Vec<Box<dyn IdentityProvider>>) -> Self {
        Self { providers }
    }

    /// Bearer token first, then session cookie.
    pub fn standard(state: AppState) -> Self {
        Self::new(vec![
            Box::new(BearerTokenProvider::new(state.settings.jwt_secret.clone())),
            Box::new(SessionCookieProvider::new(state)),
        ])
    }

    pub fn resolve(&self, headers: &HeaderMap) -> Viewer {
        for provider in &self.providers {
            if let Some(identity) = provider.resolve(headers) {
                debug!(provider = provider.name(), user_id = %identity.id, "Viewer resolved");
                return Viewer::Authenticated(identity);
            }
        }
        Viewer::Anonymous
    }
}

/// Attach a [`Viewer`] to every request. Never rejects: handlers decide
/// whether anonymous access is acceptable.
pub async fn resolve_viewer(
    State(chain): State<Arc<IdentityChain>>,
    mut req: Request,
    next: Next,
) -> Response {
    let viewer = chain.resolve(req.headers());
    req.extensions_mut().insert(viewer);
    next.run(req).await
}
