//! Custom error types for the archive service

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors reported by repositories and the services built on them
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Input the data layer refuses to persist
    #[error("{0}")]
    Validation(String),

    /// Uniqueness violation
    #[error("{0}")]
    Conflict(String),

    /// No live record matched; carries the kind of record looked for
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The random source could not produce token material
    #[error("Random source failure: {0}")]
    Randomness(#[from] rand::Error),

    /// Transport or driver failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Type alias for repository results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Custom error type for the archive HTTP surface
#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Validation(msg) => ApiError::BadRequest(msg),
            RepositoryError::Conflict(msg) => ApiError::Conflict(msg),
            RepositoryError::NotFound(_) => ApiError::NotFound(err.to_string()),
            RepositoryError::Randomness(_) | RepositoryError::Store(_) => {
                error!("Repository failure: {}", err);
                ApiError::InternalServerError
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

/// Rejections produced by the authentication gate
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingCredentials,

    #[error("Invalid authentication format")]
    InvalidFormat,

    /// Unknown, revoked or expired credential
    #[error("Invalid token")]
    InvalidToken,

    /// The token lookup itself failed; the credential may well be valid
    #[error("Error occurred during token validation")]
    Lookup(#[source] RepositoryError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::Lookup(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
