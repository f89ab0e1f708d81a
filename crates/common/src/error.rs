//! Error types for toggo.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Poll already has the maximum of {0} options")]
    MaxOptionsReached(usize),

    #[error("Poll must keep at least {0} options")]
    MinOptionsRequired(usize),

    #[error("Poll deadline has passed")]
    DeadlinePassed,

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_)
            | Self::MaxOptionsReached(_)
            | Self::MinOptionsRequired(_)
            | Self::DeadlinePassed => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,

            // 5xx Server Errors
            Self::Database(_) | Self::Redis(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::MaxOptionsReached(_) => "MAX_OPTIONS_REACHED",
            Self::MinOptionsRequired(_) => "MIN_OPTIONS_REQUIRED",
            Self::DeadlinePassed => "DEADLINE_PASSED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Classify a store error, surfacing constraint violations as client errors.
    #[must_use]
    pub fn from_db(err: &DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                tracing::debug!(detail = %detail, "Unique constraint violated");
                Self::Conflict("duplicate entry".to_string())
            }
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                tracing::debug!(detail = %detail, "Foreign key constraint violated");
                Self::from_foreign_key(&detail)
            }
            _ => Self::Database(err.to_string()),
        }
    }

    /// Ballot rows reference options through `(option_id, poll_id)`; any other
    /// foreign key names a missing parent row.
    fn from_foreign_key(detail: &str) -> Self {
        if BALLOT_OPTION_CONSTRAINTS.iter().any(|c| detail.contains(c)) {
            Self::BadRequest("option does not belong to this poll".to_string())
        } else {
            Self::BadRequest("referenced record does not exist".to_string())
        }
    }
}

/// Composite option constraints on `poll_votes` and `poll_rankings`.
const BALLOT_OPTION_CONSTRAINTS: [&str; 2] = ["fk_poll_votes_option", "fk_poll_rankings_option"];

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        Self::from_db(&err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_option_guards_are_client_errors() {
        assert_eq!(
            AppError::MaxOptionsReached(15).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::MinOptionsRequired(2).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::DeadlinePassed.status_code(), StatusCode::BAD_REQUEST);
        assert!(!AppError::DeadlinePassed.is_server_error());
    }

    #[test]
    fn test_validation_is_unprocessable() {
        let err = AppError::Validation("question: length".to_string());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_foreign_key_message_follows_constraint() {
        let ballot = AppError::from_foreign_key(
            r#"insert or update on table "poll_votes" violates foreign key constraint "fk_poll_votes_option""#,
        );
        assert!(
            matches!(ballot, AppError::BadRequest(ref m) if m == "option does not belong to this poll")
        );

        let ranking = AppError::from_foreign_key(
            r#"insert or update on table "poll_rankings" violates foreign key constraint "fk_poll_rankings_option""#,
        );
        assert!(
            matches!(ranking, AppError::BadRequest(ref m) if m == "option does not belong to this poll")
        );

        let trip = AppError::from_foreign_key(
            r#"insert or update on table "polls" violates foreign key constraint "fk_polls_trip""#,
        );
        assert!(
            matches!(trip, AppError::BadRequest(ref m) if m == "referenced record does not exist")
        );
    }

    #[test]
    fn test_plain_db_error_is_server_error() {
        let err = AppError::from(DbErr::Custom("boom".to_string()));
        assert!(matches!(err, AppError::Database(_)));
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn test_response_body_shape() {
        let response = AppError::Conflict("poll already has ballots".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "CONFLICT");
        assert_eq!(
            body["error"]["message"],
            "Conflict: poll already has ballots"
        );
    }
}
