use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// Bearer token claims. Shared by the GraphQL layer (token issuance) and the
/// identity middleware (token verification). The subscription flag is a
/// snapshot taken at issuance and is trusted until `exp`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub is_subscribed: bool,
    pub exp: usize,
}

// -- Auth routes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub user_id: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub is_subscribed: bool,
}

/// Body of `GET /auth/session`. `user` is `None` for anonymous callers.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<SessionUser>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
