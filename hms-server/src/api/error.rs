//! HTTP error mapping
//!
//! Clients distinguish two body shapes: `{"message": ...}` (auth gate and
//! most workflow outcomes) and `{"error": ...}` (validation and lookups).
//! Storage failures and anything unexpected collapse to fixed texts so no
//! internals leak.

use crate::core::{HmsError, StorageError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use tracing::{error, warn};

pub const NOT_FOUND_TEXT: &str = "The requested resource was not found.";
pub const DATABASE_ERROR_TEXT: &str = "A database error occurred.";
pub const UNEXPECTED_ERROR_TEXT: &str = "An unexpected server error occurred.";

#[derive(Debug)]
pub enum ApiError {
    /// `{"message": ...}`
    Message(StatusCode, String),
    /// `{"error": ...}`
    Error(StatusCode, String),
    /// Arbitrary body, e.g. a blocked order with its alerts
    Body(StatusCode, Value),
    NotFound,
    Database,
    Internal,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn message(status: StatusCode, text: impl Into<String>) -> Self {
        ApiError::Message(status, text.into())
    }

    pub fn error(status: StatusCode, text: impl Into<String>) -> Self {
        ApiError::Error(status, text.into())
    }

    pub fn bad_request(text: impl Into<String>) -> Self {
        ApiError::Error(StatusCode::BAD_REQUEST, text.into())
    }

    pub fn unauthorized(text: impl Into<String>) -> Self {
        ApiError::Message(StatusCode::UNAUTHORIZED, text.into())
    }

    pub fn forbidden(text: impl Into<String>) -> Self {
        ApiError::Error(StatusCode::FORBIDDEN, text.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Message(status, _) | ApiError::Error(status, _) | ApiError::Body(status, _) => *status,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Database | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<HmsError> for ApiError {
    fn from(err: HmsError) -> Self {
        match err {
            HmsError::Storage(StorageError::RowNotFound) | HmsError::NotFound { .. } => {
                warn!("Not found: {}", err);
                ApiError::NotFound
            }
            HmsError::Storage(e) => {
                error!("Database error: {}", e);
                ApiError::Database
            }
            HmsError::Validation(text) => ApiError::Error(StatusCode::BAD_REQUEST, text),
            HmsError::Conflict(text) => ApiError::Error(StatusCode::CONFLICT, text),
            HmsError::Forbidden(text) => ApiError::Message(StatusCode::FORBIDDEN, text),
            other => {
                error!("An unexpected error occurred: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Message(_, text) => json!({ "message": text }),
            ApiError::Error(_, text) => json!({ "error": text }),
            ApiError::Body(_, body) => body,
            ApiError::NotFound => json!({ "error": NOT_FOUND_TEXT }),
            ApiError::Database => json!({ "error": DATABASE_ERROR_TEXT }),
            ApiError::Internal => json!({ "error": UNEXPECTED_ERROR_TEXT }),
        };
        (status, Json(body)).into_response()
    }
}

/// Router fallback for unknown paths
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_masked() {
        let err: ApiError = HmsError::Storage(StorageError::Database("relation missing".into())).into();
        assert!(matches!(err, ApiError::Database));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn domain_errors_keep_their_text() {
        let err: ApiError = HmsError::Conflict("Patient with MRN 1 already exists.".into()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let err: ApiError = HmsError::not_found("Patient").into();
        assert!(matches!(err, ApiError::NotFound));
    }
}
