//! Error types and Axum response conversions.

use crate::auth::{AuthError, VerificationError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application error types.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A sign-in attempt failed one of the protocol checks.
    #[error("Rejected: {0}")]
    Rejected(VerificationError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Internal(msg) | AppError::Rejected(VerificationError::Internal(msg)) => {
                // Log detailed error server-side, return generic message to client
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal server error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Rejected(err) => (StatusCode::BAD_REQUEST, err.code(), err.to_string()),
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthenticated", msg.clone())
            }
        };

        let body = Json(json!({
            "ok": false,
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Verification(VerificationError::Internal(msg)) => AppError::Internal(msg),
            AuthError::Verification(e) => AppError::Rejected(e),
            AuthError::Unauthenticated => AppError::Unauthorized(err.to_string()),
        }
    }
}
