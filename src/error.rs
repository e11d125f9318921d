// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::ConstraintViolation;
use crate::services::IdentityError;

/// Application error type that converts to HTTP responses.
///
/// Every booking rejection reason has its own variant so callers (and tests)
/// can tell them apart without parsing messages.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Trial accounts cannot manage reservations")]
    TrialRestricted,

    #[error("Reservations are temporarily paused")]
    ReservationsPaused,

    #[error("Class has already started")]
    ClassStarted,

    #[error("Class is full")]
    ClassFull,

    #[error("No credits available")]
    InsufficientCredits,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ConstraintViolation> for AppError {
    fn from(violation: ConstraintViolation) -> Self {
        match violation {
            ConstraintViolation::Unique { .. } => AppError::Conflict(violation.to_string()),
            _ => AppError::Database(violation.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match ConstraintViolation::from_sqlx(&err) {
            Some(violation) => violation.into(),
            None => AppError::Database(err.to_string()),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Invalid(reason) => {
                tracing::debug!(reason = %reason, "Rejected identity token");
                AppError::InvalidToken
            }
            IdentityError::Transient(reason) => {
                AppError::Internal(anyhow::anyhow!("identity provider unavailable: {reason}"))
            }
        }
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
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),
            AppError::TrialRestricted => (StatusCode::FORBIDDEN, "trial_restricted", None),
            AppError::ReservationsPaused => (StatusCode::FORBIDDEN, "reservations_paused", None),
            AppError::ClassStarted => (StatusCode::BAD_REQUEST, "class_started", None),
            AppError::ClassFull => (StatusCode::CONFLICT, "class_full", None),
            AppError::InsufficientCredits => {
                (StatusCode::BAD_REQUEST, "insufficient_credits", None)
            }
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

/// Result type alias for handlers and services
pub type Result<T> = std::result::Result<T, AppError>;
