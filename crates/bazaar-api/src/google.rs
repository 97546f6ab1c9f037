use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use bazaar_db::is_unique_violation;
use bazaar_db::models::{NewUser, UserRow};

use crate::auth::create_token;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A Google account, as vouched for by a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[async_trait]
pub trait GoogleVerifier: Send + Sync {
    /// Check an ID token's signature, expiry and audience.
    async fn verify_id_token(&self, id_token: &str) -> ApiResult<GoogleIdentity>;

    /// Trade an authorization code from the consent redirect for an ID token.
    async fn exchange_code(&self, code: &str) -> ApiResult<String>;

    /// Consent screen URL carrying `state`, or `None` when sign-in with
    /// Google is not configured.
    fn authorize_url(&self, state: &str) -> Option<String>;
}

/// Relevant subset of the tokeninfo endpoint's response.
#[derive(Debug, Deserialize)]
pub struct TokenInfo {
    pub aud: Option<String>,
    pub sub: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    id_token: Option<String>,
}

/// Validate tokeninfo claims against our client id.
pub fn check_token_info(info: TokenInfo, client_id: &str) -> ApiResult<GoogleIdentity> {
    if info.aud.as_deref() != Some(client_id) {
        return Err(ApiError::Upstream("token audience mismatch".into()));
    }

    let sub = info
        .sub
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Upstream("token has no subject".into()))?;
    let email = info
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Upstream("token has no email".into()))?;
    if info.email_verified.as_deref() == Some("false") {
        return Err(ApiError::Upstream("email not verified".into()));
    }

    Ok(GoogleIdentity {
        sub,
        email: email.to_lowercase(),
        name: info.name,
        picture: info.picture,
    })
}

/// Talks to Google's OAuth endpoints over HTTPS.
pub struct GoogleClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleClient {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty()
    }

    fn ensure_configured(&self) -> ApiResult<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(ApiError::Upstream("Google sign-in is not configured".into()))
        }
    }
}

fn upstream(e: reqwest::Error) -> ApiError {
    warn!("Google request failed: {}", e);
    ApiError::Upstream("Google request failed".into())
}

#[async_trait]
impl GoogleVerifier for GoogleClient {
    async fn verify_id_token(&self, id_token: &str) -> ApiResult<GoogleIdentity> {
        self.ensure_configured()?;

        let resp = self
            .http
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(upstream)?;

        if !resp.status().is_success() {
            warn!("Google rejected ID token: {}", resp.status());
            return Err(ApiError::Upstream("invalid Google ID token".into()));
        }

        let info: TokenInfo = resp.json().await.map_err(upstream)?;
        check_token_info(info, &self.client_id)
    }

    async fn exchange_code(&self, code: &str) -> ApiResult<String> {
        self.ensure_configured()?;

        let resp = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(upstream)?;

        if !resp.status().is_success() {
            warn!("Google code exchange failed: {}", resp.status());
            return Err(ApiError::Upstream("authorization code rejected".into()));
        }

        let body: TokenExchangeResponse = resp.json().await.map_err(upstream)?;
        body.id_token
            .ok_or_else(|| ApiError::Upstream("token response had no id_token".into()))
    }

    fn authorize_url(&self, state: &str) -> Option<String> {
        if !self.is_configured() {
            return None;
        }

        reqwest::Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
            ],
        )
        .ok()
        .map(String::from)
    }
}

/// Verifier used when no Google client is configured. Rejects everything.
pub struct DisabledGoogle;

#[async_trait]
impl GoogleVerifier for DisabledGoogle {
    async fn verify_id_token(&self, _id_token: &str) -> ApiResult<GoogleIdentity> {
        Err(ApiError::Upstream("Google sign-in is not configured".into()))
    }

    async fn exchange_code(&self, _code: &str) -> ApiResult<String> {
        Err(ApiError::Upstream("Google sign-in is not configured".into()))
    }

    fn authorize_url(&self, _state: &str) -> Option<String> {
        None
    }
}

/// Find or create the local account for a verified Google identity. An
/// existing email/password account with the same email gets the Google id
/// linked to it.
pub fn sign_in_with_google(state: &AppState, google: GoogleIdentity) -> ApiResult<UserRow> {
    if let Some(user) = state.db.get_user_by_google_id(&google.sub)? {
        return Ok(user);
    }

    if let Some(user) = state.db.get_user_by_email(&google.email)? {
        if user.google_id.is_none() {
            state.db.link_google_id(&user.id, &google.sub)?;
            info!("Linked Google account to {} ({})", user.email, user.id);
            return state.db.get_user_by_id(&user.id)?.ok_or(ApiError::NotFound("User"));
        }
        // Same email already bound to a different Google subject.
        warn!("Google subject mismatch for {}", user.email);
        return Err(ApiError::Upstream("email is linked to another Google account".into()));
    }

    let new_user = NewUser {
        email: google.email,
        name: google.name,
        image: google.picture,
        google_id: Some(google.sub.clone()),
        ..Default::default()
    };

    match state.db.create_user(&Uuid::new_v4().to_string(), &new_user) {
        Ok(user) => {
            info!("New account {} ({}) via Google", user.email, user.id);
            Ok(user)
        }
        // A concurrent first sign-in for the same account got there first.
        Err(e) if is_unique_violation(&e) => state
            .db
            .get_user_by_google_id(&google.sub)?
            .ok_or(ApiError::EmailTaken),
        Err(e) => Err(e.into()),
    }
}

/// Verify a Google ID token and issue our own bearer token for the account.
pub async fn auth_google(state: &AppState, id_token: &str) -> ApiResult<(String, UserRow)> {
    let google = state.google.verify_id_token(id_token).await?;
    let user = sign_in_with_google(state, google)?;
    let token = create_token(&state.settings, &user)?;
    Ok((token, user))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(aud: &str) -> TokenInfo {
        TokenInfo {
            aud: Some(aud.into()),
            sub: Some("g-123".into()),
            email: Some("Person@Gmail.com".into()),
            email_verified: Some("true".into()),
            name: Some("Person".into()),
            picture: None,
        }
    }

    #[test]
    fn accepts_matching_audience() {
        let identity = check_token_info(info("client-1"), "client-1").unwrap();
        assert_eq!(identity.sub, "g-123");
        assert_eq!(identity.email, "person@gmail.com");
        assert_eq!(identity.name.as_deref(), Some("Person"));
    }

    #[test]
    fn rejects_foreign_audience() {
        assert!(matches!(check_token_info(info("someone-else"), "client-1"), Err(ApiError::Upstream(_))));
    }

    #[test]
    fn rejects_unverified_email() {
        let mut info = info("client-1");
        info.email_verified = Some("false".into());
        assert!(matches!(check_token_info(info, "client-1"), Err(ApiError::Upstream(_))));
    }

    #[test]
    fn rejects_missing_email() {
        let mut info = info("client-1");
        info.email = None;
        assert!(check_token_info(info, "client-1").is_err());
    }

    #[test]
    fn tokeninfo_json_parses() {
        let json = r#"{"aud":"c","sub":"1","email":"a@x.com","email_verified":"true","exp":"0"}"#;
        let parsed: TokenInfo = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.sub.as_deref(), Some("1"));
    }

    #[test]
    fn authorize_url_carries_state() {
        let client = GoogleClient::new("cid".into(), "secret".into(), "http://localhost/cb".into()).unwrap();
        let url = client.authorize_url("xyz").unwrap();
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("state=xyz"));
        assert!(url.contains("client_id=cid"));
        assert!(!url.contains("secret"));
    }

    #[test]
    fn unconfigured_client_has_no_authorize_url() {
        let client = GoogleClient::new(String::new(), String::new(), String::new()).unwrap();
        assert!(client.authorize_url("xyz").is_none());
    }
}
