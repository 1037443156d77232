//! API error responses
//!
//! Every failure is rendered as `{"error": {"code": ..., "message": ...}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409), e.g. download already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Component store unavailable (503)
    #[error("Storage unavailable: {0}")]
    Storage(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<crate::Error> for ApiError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::AlreadyRunning(key) => ApiError::Conflict(format!("Download already running for {}", key)),
            e @ crate::Error::Storage { .. } => ApiError::Storage(e.to_string()),
            crate::Error::Common(voicepack_common::Error::InvalidInput(msg)) => ApiError::BadRequest(msg),
            crate::Error::Common(voicepack_common::Error::NotFound(msg)) => ApiError::NotFound(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<voicepack_common::Error> for ApiError {
    fn from(err: voicepack_common::Error) -> Self {
        crate::Error::Common(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Storage(msg) => (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_ERROR", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_running_maps_to_conflict() {
        let err: ApiError = crate::Error::AlreadyRunning("yue/female/offline".to_string()).into();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_invalid_mode_maps_to_bad_request() {
        let err: ApiError = voicepack_common::Error::InvalidInput("Unknown mode: x".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
