//! services/api/src/error.rs
//!
//! Defines the error types of the API service: `ApiError` for anything that can
//! stop the process at startup, and `RestError` for failures that are turned
//! into an HTTP error envelope.

use crate::adapters::MailerError;
use crate::config::ConfigError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use review_core::token::TokenError;
use review_core::{ErrorCode, WorkflowError};
use serde::Serialize;
use utoipa::ToSchema;

//=========================================================================================
// Startup Errors
//=========================================================================================

/// The primary error type for starting the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The configured token secret cannot key the token codec.
    #[error("Token codec error: {0}")]
    Token(#[from] TokenError),

    /// The SMTP settings cannot build a mail transport.
    #[error("Mailer error: {0}")]
    Mailer(#[from] MailerError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

//=========================================================================================
// HTTP Errors
//=========================================================================================

/// The body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Public error code such as `GENERAL-002`.
    #[schema(example = "GENERAL-002")]
    pub code: String,
    #[schema(example = "Validation error")]
    pub message: String,
    /// Per-field messages for validation failures, otherwise null.
    pub details: Option<Vec<String>>,
}

/// An error returned from a handler.
#[derive(Debug)]
pub struct RestError {
    status: StatusCode,
    code: ErrorCode,
    details: Option<Vec<String>>,
}

impl RestError {
    pub fn validation(details: Vec<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: ErrorCode::ValidationError,
            details: Some(details),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl From<WorkflowError> for RestError {
    fn from(e: WorkflowError) -> Self {
        let status = match &e {
            WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
            WorkflowError::AlreadyReviewed(_) => StatusCode::CONFLICT,
            WorkflowError::RequestNotFound | WorkflowError::PdfNotFound => StatusCode::NOT_FOUND,
            WorkflowError::InvalidToken => StatusCode::UNAUTHORIZED,
            WorkflowError::System(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            code: e.code(),
            details: e.details(),
        }
    }
}

impl From<JsonRejection> for RestError {
    fn from(rejection: JsonRejection) -> Self {
        // Oversized bodies keep their 413; everything else is a plain 400.
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            ..Self::validation(vec![rejection.body_text()])
        }
    }
}

impl From<QueryRejection> for RestError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(vec![rejection.body_text()])
    }
}

impl From<PathRejection> for RestError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(vec![rejection.body_text()])
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.public_code().to_string(),
            message: self.code.message().to_string(),
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn workflow_errors_map_to_statuses() {
        let cases = [
            (WorkflowError::Validation(vec!["x".into()]), StatusCode::BAD_REQUEST, "GENERAL-002"),
            (WorkflowError::AlreadyReviewed(Uuid::nil()), StatusCode::CONFLICT, "GENERAL-002"),
            (WorkflowError::RequestNotFound, StatusCode::NOT_FOUND, "REQUEST-001"),
            (WorkflowError::PdfNotFound, StatusCode::NOT_FOUND, "REQUEST-002"),
            (WorkflowError::InvalidToken, StatusCode::UNAUTHORIZED, "REQUEST-003"),
            (WorkflowError::System("db down".into()), StatusCode::INTERNAL_SERVER_ERROR, "GENERAL-001"),
        ];
        for (error, status, code) in cases {
            let rest = RestError::from(error);
            assert_eq!(rest.status(), status);
            assert_eq!(rest.code().public_code(), code);
        }
    }

    #[test]
    fn system_detail_is_not_exposed() {
        let rest = RestError::from(WorkflowError::System("password=hunter2".into()));
        assert!(rest.details.is_none());
    }
}
