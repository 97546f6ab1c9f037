#![allow(dead_code)]

use std::sync::Arc;

use async_graphql::{Request, Variables};
use async_trait::async_trait;
use serde_json::Value;

use bazaar_api::auth::decode_token;
use bazaar_api::error::{ApiError, ApiResult};
use bazaar_api::google::{GoogleIdentity, GoogleVerifier};
use bazaar_api::graphql::{AppSchema, build_schema};
use bazaar_api::policy::EmailAllowList;
use bazaar_api::state::{AppState, AppStateInner, Settings};
use bazaar_api::viewer::Viewer;
use bazaar_db::Database;

pub const SECRET: &str = "integration-test-secret";
pub const ADMIN_EMAIL: &str = "admin@x.com";

/// Accepts ID tokens of the form `good:<sub>:<email>`; authorization codes
/// are exchanged for `good:g-code:code@gmail.com`.
pub struct StubGoogle;

#[async_trait]
impl GoogleVerifier for StubGoogle {
    async fn verify_id_token(&self, id_token: &str) -> ApiResult<GoogleIdentity> {
        let mut parts = id_token.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("good"), Some(sub), Some(email)) => Ok(GoogleIdentity {
                sub: sub.into(),
                email: email.into(),
                name: Some("Googler".into()),
                picture: Some("https://img.example/p.png".into()),
            }),
            _ => Err(ApiError::Upstream("invalid Google ID token".into())),
        }
    }

    async fn exchange_code(&self, code: &str) -> ApiResult<String> {
        if code == "valid-code" {
            Ok("good:g-code:code@gmail.com".into())
        } else {
            Err(ApiError::Upstream("authorization code rejected".into()))
        }
    }

    fn authorize_url(&self, state: &str) -> Option<String> {
        Some(format!("https://accounts.example/auth?state={state}"))
    }
}

pub fn state() -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        settings: Settings::new(SECRET),
        admin: Arc::new(EmailAllowList::parse(ADMIN_EMAIL)),
        google: Arc::new(StubGoogle),
    })
}

/// In-process schema plus the state behind it.
pub struct Harness {
    pub state: AppState,
    pub schema: AppSchema,
}

impl Harness {
    pub fn new() -> Self {
        let state = state();
        let schema = build_schema(state.clone());
        Self { state, schema }
    }

    pub async fn exec(&self, viewer: &Viewer, query: &str, vars: Value) -> async_graphql::Response {
        let req = Request::new(query)
            .variables(Variables::from_json(vars))
            .data(viewer.clone());
        self.schema.execute(req).await
    }

    /// Run and expect success; returns `data` as JSON.
    pub async fn ok(&self, viewer: &Viewer, query: &str, vars: Value) -> Value {
        let resp = self.exec(viewer, query, vars).await;
        assert!(resp.errors.is_empty(), "unexpected errors: {:?}", resp.errors);
        resp.data.into_json().unwrap()
    }

    /// Run and expect an error; returns its `extensions.code`.
    pub async fn err_code(&self, viewer: &Viewer, query: &str, vars: Value) -> String {
        let resp = self.exec(viewer, query, vars).await;
        let err = resp.errors.first().expect("expected an error");
        match err.extensions.as_ref().and_then(|ext| ext.get("code")) {
            Some(async_graphql::Value::String(code)) => code.clone(),
            other => panic!("error without code: {:?} ({:?})", err.message, other),
        }
    }

    /// Sign up through the schema and return the bearer token's viewer.
    pub async fn sign_up(&self, email: &str) -> (String, Viewer) {
        let data = self
            .ok(
                &Viewer::Anonymous,
                "mutation($e: String!) { signUp(email: $e, password: \"hunter22\") { token user { id } } }",
                serde_json::json!({ "e": email }),
            )
            .await;
        let id = data["signUp"]["user"]["id"].as_str().unwrap().to_string();
        let token = data["signUp"]["token"].as_str().unwrap();
        (id, viewer_for(token))
    }

    /// Fresh token for an existing account, picking up its current
    /// subscription flag.
    pub async fn login(&self, email: &str) -> Viewer {
        let data = self
            .ok(
                &Viewer::Anonymous,
                "mutation($e: String!) { login(email: $e, password: \"hunter22\") { token } }",
                serde_json::json!({ "e": email }),
            )
            .await;
        viewer_for(data["login"]["token"].as_str().unwrap())
    }

    /// Submit and approve a subscription for the viewer.
    pub async fn subscribe_and_approve(&self, viewer: &Viewer) {
        let data = self
            .ok(
                viewer,
                "mutation { subscribe(receiptUrl: \"https://pay.example/r/1\") { id } }",
                Value::Null,
            )
            .await;
        let id = data["subscribe"]["id"].as_str().unwrap().to_string();

        let admin = self.admin().await;
        self.ok(
            &admin,
            "mutation($id: ID!) { approveSubscription(id: $id) { status } }",
            serde_json::json!({ "id": id }),
        )
        .await;
    }

    pub async fn admin(&self) -> Viewer {
        if self.state.db.get_user_by_email(ADMIN_EMAIL).unwrap().is_some() {
            self.login(ADMIN_EMAIL).await
        } else {
            self.sign_up(ADMIN_EMAIL).await.1
        }
    }
}

pub fn viewer_for(token: &str) -> Viewer {
    Viewer::Authenticated(decode_token(SECRET, token).unwrap().into())
}
