// =============================================================================
// ERROR MODULE
// =============================================================================
// This module defines custom error types and their HTTP responses.
//
// LEARNING NOTES:
// - Rust doesn't have exceptions; it uses Result<T, E> for error handling
// - thiserror crate makes defining error types easy
// - We convert our errors to HTTP responses using Axum's IntoResponse
//
// Pricing itself never produces an error: a product that cannot be adjusted
// is quoted at its base price. Errors here come from lookups, storage and
// settings authorization.
// =============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// =============================================================================
// CUSTOM ERROR TYPE
// =============================================================================
#[derive(Debug, Error)]
pub enum AppError {
    /// Database query failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Redis operation failed
    #[error("Cache error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Product not found in the catalog
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Settings change without a valid admin token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable code and HTTP status for each variant
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            AppError::Redis(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CACHE_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

// =============================================================================
// HTTP RESPONSE CONVERSION
// =============================================================================
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();

        // Don't expose internal details
        let message = match &self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Internal(msg) => msg.clone(),
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Redis(_) => "A cache error occurred".to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error_code = error_code, error = %self, "Request failed");
        } else {
            tracing::warn!(error_code = error_code, message = %message, "Request rejected");
        }

        let body = ErrorResponse::new(error_code, message);

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// RESULT TYPE ALIAS
// =============================================================================
pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::NotFound("SKU-1".into()), StatusCode::NOT_FOUND),
            (AppError::BadRequest("qty".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("token".into()), StatusCode::UNAUTHORIZED),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_anyhow_becomes_internal() {
        let error: AppError = anyhow::anyhow!("settings record is corrupt").into();
        assert!(matches!(error, AppError::Internal(ref msg) if msg.contains("corrupt")));
    }
}
