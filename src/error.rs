//! Error types for the CFP review service.
//!
//! Store and service functions return [`Result`]; handlers return it directly
//! and the [`IntoResponse`] impl turns failures into `{"error": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before any write
    #[error("{0}")]
    Validation(String),

    /// Write refused because an equivalent row already exists
    #[error("{0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Caller is known but may not perform the operation
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// No caller identity on the request
    #[error("Authentication required")]
    Unauthenticated,

    /// Operation not allowed from the record's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Email provider error: {0}")]
    EmailProvider(String),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn access_denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AccessDenied(_) => StatusCode::FORBIDDEN,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::InvalidState(_) => StatusCode::CONFLICT,
            Error::EmailProvider(_) => StatusCode::BAD_GATEWAY,
            Error::Database(_) | Error::Template(_) | Error::Config(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the caller. Upstream failures are collapsed
    /// into a generic message; details only go to the log.
    pub fn public_message(&self) -> String {
        match self {
            Error::Database(_) | Error::Template(_) | Error::Config(_) | Error::Internal(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            Error::EmailProvider(_) => "Failed to send email. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        let err = Error::Conflict("You have already reviewed this submission".into());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.public_message(), "You have already reviewed this submission");

        let err = Error::not_found("Submission");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.public_message(), "Submission not found");
    }

    #[test]
    fn upstream_errors_are_generic() {
        let err = Error::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("row"));

        let err = Error::EmailProvider("503 from upstream".into());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(!err.public_message().contains("503"));
    }
}
