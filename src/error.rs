// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.
//!
//! Scan rejections each map to exactly one short user-facing message; the
//! only kind a client should retry is `Database` (transient store failure).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Not a valid station code")]
    InvalidPayload,

    #[error("Wrong QR code for this station")]
    StationMismatch,

    #[error("Station not found")]
    StationNotFound,

    #[error("This station is no longer active")]
    StationInactive,

    #[error("You already checked in at this station")]
    AlreadyScanned,

    #[error("Your account could not be found")]
    UserNotFound,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the caller may retry the same request unchanged.
    ///
    /// Only transient store failures qualify; every other kind needs a
    /// different input (re-scan, different station) or is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Database(_))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::InvalidPayload => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_payload"),
            AppError::StationMismatch => (StatusCode::CONFLICT, "station_mismatch"),
            AppError::StationNotFound => (StatusCode::NOT_FOUND, "station_not_found"),
            AppError::StationInactive => (StatusCode::CONFLICT, "station_inactive"),
            AppError::AlreadyScanned => (StatusCode::CONFLICT, "already_scanned"),
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "user_not_found"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::SERVICE_UNAVAILABLE, "store_error")
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        // Internal detail stays in the logs; the body carries only the
        // short human-readable message.
        let message = match &self {
            AppError::Database(_) => "Scan failed. Try again.".to_string(),
            AppError::Internal(_) => "Something went wrong.".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message,
            retryable: self.is_retryable(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_scan_rejections_map_to_expected_statuses() {
        assert_eq!(status_of(AppError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(AppError::InvalidPayload),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_of(AppError::StationMismatch), StatusCode::CONFLICT);
        assert_eq!(status_of(AppError::StationNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::AlreadyScanned), StatusCode::CONFLICT);
        assert_eq!(status_of(AppError::UserNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(AppError::Database("connection reset".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_only_store_failures_are_retryable() {
        assert!(AppError::Database("timeout".to_string()).is_retryable());
        assert!(!AppError::AlreadyScanned.is_retryable());
        assert!(!AppError::StationMismatch.is_retryable());
        assert!(!AppError::InvalidPayload.is_retryable());
    }

    #[test]
    fn test_database_detail_not_exposed_to_user() {
        let err = AppError::Database("grpc deadline exceeded at 10.0.0.3".to_string());
        let display = err.to_string();
        // Display carries detail for logs; the response body must not.
        assert!(display.contains("grpc"));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
