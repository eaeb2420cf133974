//! Error types for Microblog
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Which unique field a write collided with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    DuplicateUsername,
    DuplicateEmail,
}

impl ConflictKind {
    fn message(self) -> &'static str {
        match self {
            Self::DuplicateUsername => "Username is already taken",
            Self::DuplicateEmail => "Email is already registered",
        }
    }

    fn field(self) -> &'static str {
        match self {
            Self::DuplicateUsername => "username",
            Self::DuplicateEmail => "email",
        }
    }
}

/// A single form-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Anonymous access to a protected route (303 to the login page)
    #[error("Authentication required")]
    Unauthenticated {
        /// Path the user was trying to reach
        next: Option<String>,
    },

    /// Login failed (401). Never says which half of the credentials was wrong.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Uniqueness violation (409)
    #[error("Conflict: {}", .0.message())]
    Conflict(ConflictKind),

    /// A user tried to follow themselves (400)
    #[error("You cannot follow yourself")]
    SelfFollowRejected,

    /// `/unfollow` aimed at the caller's own profile (400)
    #[error("You cannot unfollow yourself")]
    SelfUnfollowRejected,

    /// Unknown user or post (404)
    #[error("Resource not found")]
    NotFound,

    /// Reset token malformed, expired or forged (400)
    #[error("The password reset link is invalid or has expired")]
    InvalidToken,

    /// Form validation failed (400)
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Mail delivery error (500)
    #[error("Mail error: {0}")]
    Mail(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short machine-readable label used for metrics
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Unauthenticated { .. } => "unauthenticated",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Conflict(_) => "conflict",
            AppError::SelfFollowRejected => "self_follow_rejected",
            AppError::SelfUnfollowRejected => "self_unfollow_rejected",
            AppError::NotFound => "not_found",
            AppError::InvalidToken => "invalid_token",
            AppError::Validation(_) => "validation",
            AppError::Database(_) => "database",
            AppError::Mail(_) => "mail",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    /// Build a validation error for a single field
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }
}

impl From<sqlx::Error> for AppError {
    /// Unique-constraint violations become typed conflicts; everything else
    /// stays a database error.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let message = db_err.message();
                if message.contains("users.username") {
                    return AppError::Conflict(ConflictKind::DuplicateUsername);
                }
                if message.contains("users.email") {
                    return AppError::Conflict(ConflictKind::DuplicateEmail);
                }
            }
        }
        AppError::Database(err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body. Server-side failures are logged here and
    /// answered with a generic message.
    fn into_response(self) -> Response {
        use axum::Json;

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[self.error_type()])
            .inc();

        let body = match &self {
            AppError::Unauthenticated { next } => {
                let location = crate::auth::login_url(next.as_deref());
                let body = Json(serde_json::json!({
                    "error": self.to_string(),
                    "login_url": location,
                }));
                return (StatusCode::SEE_OTHER, [(header::LOCATION, location)], body)
                    .into_response();
            }
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string(), None),
            AppError::Conflict(kind) => (
                StatusCode::CONFLICT,
                kind.message().to_string(),
                Some(vec![FieldError::new(kind.field(), kind.message())]),
            ),
            AppError::SelfFollowRejected | AppError::SelfUnfollowRejected => {
                (StatusCode::BAD_REQUEST, self.to_string(), None)
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), None),
            AppError::InvalidToken => (StatusCode::BAD_REQUEST, self.to_string(), None),
            AppError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                self.to_string(),
                Some(fields.clone()),
            ),
            AppError::Database(_)
            | AppError::Mail(_)
            | AppError::Config(_)
            | AppError::Internal(_) => {
                tracing::error!(error = %self, error_type = self.error_type(), "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let (status, error_message, fields) = body;
        let body = match fields {
            Some(fields) => Json(serde_json::json!({
                "error": error_message,
                "fields": fields,
            })),
            None => Json(serde_json::json!({
                "error": error_message,
            })),
        };

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
