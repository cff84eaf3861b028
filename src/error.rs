//! Structured error types for HTTP responses.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    ValidationError,
    DuplicateUsername,

    // Authentication errors
    Unauthenticated,
    MalformedCredential,
    InvalidCredential,
    InvalidCredentials,

    // Not found errors
    NotFound,

    // Internal errors
    DatabaseError,
    InternalError,
    ProviderError,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError | ErrorCode::DuplicateUsername => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthenticated
            | ErrorCode::MalformedCredential
            | ErrorCode::InvalidCredential
            | ErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ProviderError => StatusCode::BAD_GATEWAY,
            ErrorCode::DatabaseError | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Structured error returned by every handler.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    #[serde(rename = "error")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorCode::ValidationError, format!("{} is required", field)).with_field(field)
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, reason).with_field(field)
    }

    pub fn duplicate_username() -> Self {
        Self::new(ErrorCode::DuplicateUsername, "Username already exists").with_field("username")
    }

    pub fn unauthenticated() -> Self {
        Self::new(
            ErrorCode::Unauthenticated,
            "Access denied. No token provided.",
        )
    }

    pub fn malformed_credential() -> Self {
        Self::new(ErrorCode::MalformedCredential, "Invalid token format")
    }

    pub fn invalid_credential() -> Self {
        Self::new(ErrorCode::InvalidCredential, "Invalid token")
    }

    /// Same message for unknown user and wrong password.
    pub fn invalid_credentials() -> Self {
        Self::new(ErrorCode::InvalidCredentials, "Invalid credentials")
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("Task not found: {}", task_id))
    }

    pub fn subtask_not_found(task_id: &str, index: &str) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("Subtask {} not found on task {}", index, task_id),
        )
    }

    pub fn user_not_found() -> Self {
        Self::new(ErrorCode::NotFound, "User not found")
    }

    pub fn calendar_not_connected() -> Self {
        Self::new(ErrorCode::ValidationError, "Calendar not connected")
    }

    pub fn provider(err: impl fmt::Display) -> Self {
        tracing::warn!(error = %err, "Calendar provider call failed");
        Self::new(ErrorCode::ProviderError, "Calendar provider request failed")
    }

    pub fn database(err: impl fmt::Display) -> Self {
        tracing::error!(error = %err, "Database error");
        Self::new(ErrorCode::DatabaseError, "A storage error occurred")
    }

    /// Logs the details; the response carries a generic message.
    pub fn internal(err: impl fmt::Display) -> Self {
        tracing::error!(error = %err, "Internal error");
        Self::new(ErrorCode::InternalError, "An internal error occurred")
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Domain errors travel inside anyhow; everything else is storage
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => match err.downcast::<rusqlite::Error>() {
                Ok(sql_err) => ApiError::database(sql_err),
                Err(err) => ApiError::internal(err),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(ErrorCode::ValidationError, rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::new(ErrorCode::ValidationError, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

/// Result type for handler operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_and_auth_codes_map_to_statuses() {
        assert_eq!(ErrorCode::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::MalformedCredential.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::DuplicateUsername.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::DatabaseError.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn anyhow_roundtrip_preserves_api_error() {
        let err: anyhow::Error = ApiError::task_not_found("abc").into();
        let back = ApiError::from(err);
        assert_eq!(back.code, ErrorCode::NotFound);
        assert!(back.message.contains("abc"));
    }

    #[test]
    fn serializes_error_message_under_error_key() {
        let json = serde_json::to_value(ApiError::missing_field("title")).unwrap();
        assert_eq!(json["error"], "title is required");
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["field"], "title");
    }
}
