use anyhow::anyhow;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use email_address::EmailAddress;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use bazaar_db::is_unique_violation;
use bazaar_db::models::{NewUser, UserRow};
use bazaar_types::api::Claims;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, Settings, deadline};
use crate::viewer::{Identity, IdentitySource};

pub const SESSION_COOKIE: &str = "bazaar_session";

const MAX_PASSWORD_LEN: usize = 256;

// -- Passwords --

/// Argon2id hash in PHC string form. Runs off the async runtime.
pub async fn hash_password(password: String) -> ApiResult<String> {
    let hashed = tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| anyhow!("Password hashing failed: {}", e))
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

    Ok(hashed)
}

pub async fn verify_password(password: String, password_hash: String) -> ApiResult<bool> {
    let ok = tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&password_hash).map_err(|e| anyhow!("Corrupt password hash: {}", e))?;
        Ok::<_, anyhow::Error>(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

    Ok(ok)
}

// -- Bearer tokens --

pub fn create_token(settings: &Settings, user: &UserRow) -> ApiResult<String> {
    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        is_subscribed: user.is_subscribed,
        exp: deadline(chrono::Utc::now(), settings.token_ttl)? as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )
    .map_err(|e| anyhow!("Token encoding failed: {}", e))?;

    Ok(token)
}

/// Verify signature and expiry. The claims are returned as issued.
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity {
            id: claims.sub,
            email: claims.email,
            is_subscribed: claims.is_subscribed,
            source: IdentitySource::BearerToken,
        }
    }
}

// -- Sessions --

/// Fresh opaque session token. Only its hash is persisted.
pub fn new_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    B64.encode(bytes)
}

pub fn hash_session_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Create a session row for `user_id` and return the raw cookie token.
pub fn start_session(state: &AppState, user_id: &str) -> ApiResult<String> {
    let now = chrono::Utc::now();
    state.db.purge_expired_sessions(now.timestamp())?;

    let token = new_session_token();
    let expires_at = deadline(now, state.settings.session_ttl)?;
    state.db.create_session(&hash_session_token(&token), user_id, expires_at)?;

    Ok(token)
}

pub fn end_session(state: &AppState, token_hash: &str) -> ApiResult<bool> {
    Ok(state.db.delete_session(token_hash)?)
}

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Cookie that overwrites and expires the session cookie.
pub fn session_removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    cookie.make_removal();
    cookie
}

// -- Accounts --

pub fn normalize_email(raw: &str) -> ApiResult<String> {
    let email = raw.trim().to_lowercase();
    if !EmailAddress::is_valid(&email) {
        return Err(ApiError::validation("Invalid email address"));
    }
    Ok(email)
}

fn validate_password(password: &str) -> ApiResult<()> {
    if password.is_empty() {
        return Err(ApiError::validation("Password must not be empty"));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(ApiError::validation("Password is too long"));
    }
    Ok(())
}

/// Register an email/password account and issue a bearer token for it.
pub async fn sign_up(
    state: &AppState,
    email: &str,
    password: &str,
    name: Option<String>,
) -> ApiResult<(String, UserRow)> {
    let email = normalize_email(email)?;
    validate_password(password)?;

    // Check if email is taken
    if state.db.get_user_by_email(&email)?.is_some() {
        return Err(ApiError::EmailTaken);
    }

    let password_hash = hash_password(password.to_string()).await?;

    let user_id = Uuid::new_v4().to_string();
    let new_user = NewUser {
        email,
        name: name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        password_hash: Some(password_hash),
        ..Default::default()
    };

    let user = state.db.create_user(&user_id, &new_user).map_err(|e| {
        // Lost a race with a concurrent sign-up for the same email.
        if is_unique_violation(&e) { ApiError::EmailTaken } else { ApiError::Internal(e) }
    })?;

    info!("New account {} ({})", user.email, user.id);

    let token = create_token(&state.settings, &user)?;
    Ok((token, user))
}

/// Check an email/password pair. Unknown emails, wrong passwords and
/// Google-only accounts all fail the same way.
pub async fn authenticate(state: &AppState, email: &str, password: &str) -> ApiResult<UserRow> {
    let email = email.trim().to_lowercase();
    let user = state
        .db
        .get_user_by_email(&email)?
        .ok_or(ApiError::InvalidCredentials)?;

    let Some(password_hash) = user.password_hash.clone() else {
        return Err(ApiError::InvalidCredentials);
    };

    if !verify_password(password.to_string(), password_hash).await? {
        return Err(ApiError::InvalidCredentials);
    }

    Ok(user)
}

pub async fn login(state: &AppState, email: &str, password: &str) -> ApiResult<(String, UserRow)> {
    let user = authenticate(state, email, password).await?;
    let token = create_token(&state.settings, &user)?;
    Ok((token, user))
}

/// Hash of the session cookie a request carried, whichever identity won.
#[derive(Debug, Clone)]
pub struct PresentedSession(pub String);

/// Revoke the caller's cookie session if there is one, plus any session
/// cookie sent alongside a bearer token. Bearer tokens are stateless and
/// simply stop being sent by the client.
pub fn logout(state: &AppState, identity: &Identity, presented: Option<&PresentedSession>) -> ApiResult<bool> {
    if let IdentitySource::Session { token_hash } = &identity.source {
        if !end_session(state, token_hash)? {
            warn!("Session for {} was already gone at logout", identity.id);
        }
    }
    if let Some(PresentedSession(token_hash)) = presented {
        end_session(state, token_hash)?;
    }
    Ok(true)
}
