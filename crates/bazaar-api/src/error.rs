use async_graphql::ErrorExtensions;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use bazaar_types::api::ErrorResponse;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Email is already registered")]
    EmailTaken,

    #[error("{0}")]
    Validation(String),

    #[error("Could not allocate a public code, try again")]
    PublicCodeExhausted,

    #[error("Identity verification failed: {0}")]
    Upstream(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    /// Stable machine-readable code, sent as `extensions.code`.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized | ApiError::InvalidCredentials => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::EmailTaken => "EMAIL_TAKEN",
            ApiError::Validation(_) => "BAD_USER_INPUT",
            ApiError::PublicCodeExhausted => "CONFLICT",
            ApiError::Upstream(_) => "UPSTREAM_AUTH",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::EmailTaken | ApiError::PublicCodeExhausted => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn log_internal(&self) {
        if let ApiError::Internal(e) = self {
            error!("Internal error: {:#}", e);
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> async_graphql::Error {
        self.log_internal();
        async_graphql::Error::new(self.to_string()).extend_with(|_, ext| ext.set("code", self.code()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Wrap a storage failure for a GraphQL field resolver.
pub fn internal(e: anyhow::Error) -> async_graphql::Error {
    ApiError::Internal(e).extend()
}
