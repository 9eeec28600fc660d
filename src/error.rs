// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

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

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("YouTube API error: {0}")]
    YouTubeApi(String),

    #[error("Drive API error: {0}")]
    Drive(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Marker message for responses blocked by platform policy (HTTP 403).
    pub const REMOTE_FORBIDDEN: &'static str = "Restricted by platform policy";

    /// Marker message for a rejected bearer credential (HTTP 401).
    pub const REMOTE_TOKEN_ERROR: &'static str = "Remote token rejected";

    /// True if this is the platform-policy restriction (403) marker.
    ///
    /// A 403 on the Watch Later endpoint is a documented YouTube limitation,
    /// not a transient failure; callers map it to an empty result.
    pub fn is_remote_forbidden(&self) -> bool {
        matches!(
            self,
            AppError::YouTubeApi(msg) | AppError::Drive(msg)
                if msg.contains(Self::REMOTE_FORBIDDEN)
        )
    }

    /// True if the remote API rejected our bearer token.
    pub fn is_remote_token_error(&self) -> bool {
        matches!(
            self,
            AppError::YouTubeApi(msg) | AppError::Drive(msg)
                if msg.contains(Self::REMOTE_TOKEN_ERROR)
        )
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::OAuth(msg) => (StatusCode::BAD_GATEWAY, "oauth_error", Some(msg.clone())),
            // A rejected bearer credential means the user must re-authenticate,
            // not that the upstream API is down.
            AppError::YouTubeApi(msg) | AppError::Drive(msg) if self.is_remote_token_error() => {
                tracing::warn!(error = %msg, "Remote credential rejected");
                (StatusCode::UNAUTHORIZED, "invalid_token", None)
            }
            AppError::YouTubeApi(msg) => {
                (StatusCode::BAD_GATEWAY, "youtube_error", Some(msg.clone()))
            }
            AppError::Drive(msg) => (StatusCode::BAD_GATEWAY, "drive_error", Some(msg.clone())),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
