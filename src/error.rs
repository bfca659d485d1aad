//! Error types for Platzigram
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use thiserror::Error;

use crate::forms::FormErrors;

/// Path of the login page that unauthenticated requests are sent to
pub const LOGIN_URL: &str = "/users/login/";

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Not found")]
    NotFound,

    /// Authentication required (redirect to login)
    #[error("Authentication required")]
    Unauthorized,

    /// Wrong username or password (400)
    ///
    /// Deliberately does not say which of the two was wrong.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Submitted form failed validation (400)
    #[error("Form validation failed")]
    Form(FormErrors),

    /// Malformed request input (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Media storage error (500)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Hashing/signing error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Validation(format!("Failed to parse multipart: {}", err))
    }
}

impl AppError {
    fn error_type(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Form(_) => "form",
            AppError::Validation(_) => "validation",
            AppError::Database(_) => "database",
            AppError::Storage(_) => "storage",
            AppError::Config(_) => "config",
            AppError::Encryption(_) => "encryption",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Unauthorized requests are redirected to the login page; everything
    /// else maps to a status code and a JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.error_type()]).inc();

        let (status, error_message) = match self {
            AppError::Unauthorized => return Redirect::to(LOGIN_URL).into_response(),
            AppError::Form(errors) => {
                return (StatusCode::BAD_REQUEST, Json(errors)).into_response();
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                "Invalid username or password".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Database(ref error) => {
                tracing::error!(%error, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::Storage(ref msg) => {
                tracing::error!(error = %msg, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
            AppError::Config(ref msg) => {
                tracing::error!(error = %msg, "Configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Encryption(ref msg) => {
                tracing::error!(error = %msg, "Encryption error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(ref error) => {
                tracing::error!(%error, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

