//! Error handling module for the team members backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and the
//! failure envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::validation::{fields, FieldError, ValidationErrors};

/// Message returned for failures the client cannot act on.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred.";

/// Envelope status values.
pub mod status {
    pub const SUCCESS: &str = "success";
    pub const FAIL: &str = "FAIL";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found
    NotFound(String),
    /// One or more field validation failures
    Validation(ValidationErrors),
    /// Malformed request
    BadRequest(String),
    /// Known path, unsupported verb
    MethodNotAllowed(String),
    /// Database error
    Database(String),
    /// Internal server error
    Internal(String),
}

impl AppError {
    pub fn member_not_found(id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("Team member {} not found", id))
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error, used in logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-facing message. Server-side failures never leak their details.
    pub fn message(&self) -> ErrorMessage {
        match self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::MethodNotAllowed(msg) => ErrorMessage::Text(msg.clone()),
            AppError::Validation(errors) => ErrorMessage::Fields(errors.clone()),
            AppError::Database(_) | AppError::Internal(_) => {
                ErrorMessage::Text(UNKNOWN_ERROR_MESSAGE.to_string())
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation(errors) => write!(f, "{}: {}", self.error_code(), errors),
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::MethodNotAllowed(msg)
            | AppError::Database(msg)
            | AppError::Internal(msg) => write!(f, "{}: {}", self.error_code(), msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // The email UNIQUE constraint is the only one a client can trip.
            if db_err.is_unique_violation() && db_err.message().contains("email") {
                tracing::warn!("Email uniqueness enforced by store: {}", db_err);
                return AppError::Validation(ValidationErrors::single(
                    fields::EMAIL,
                    FieldError::DuplicateEmail,
                ));
            }
        }
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

/// Either a plain message or a per-field error map.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    Fields(ValidationErrors),
}

/// Error details in the response envelope.
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub message: ErrorMessage,
}

/// Failure envelope: `{ "status": "FAIL", "errors": { "message": ... } }`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub errors: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            status: status::FAIL,
            errors: ErrorDetails {
                message: error.message(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (status, Json(ErrorResponse::new(&self))).into_response()
    }
}
