//! # Error Types
//!
//! This module defines error types used throughout the placard library.
//!
//! Every variant maps to one HTTP status via [`PlacardError::status_code`],
//! so the front end never has to guess how a pipeline failure should be
//! reported.

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for placard operations
#[derive(Debug, Error)]
pub enum PlacardError {
    /// Missing or invalid access token
    #[error("Unauthorized: {0}")]
    Auth(String),

    /// Unknown template, or a substitution id with no matching node
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request is well-formed but unusable (e.g. no substitution parameters)
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Upstream failure: template store unreachable, image fetch or decode failed
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// Unexpected failure while composing or rasterizing the scene
    #[error("Render error: {0}")]
    Render(String),

    /// Template document could not be parsed
    #[error("Template error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlacardError {
    /// HTTP status the front end reports for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PlacardError::Auth(_) => StatusCode::UNAUTHORIZED,
            PlacardError::NotFound(_) => StatusCode::NOT_FOUND,
            PlacardError::Validation(_) => StatusCode::BAD_REQUEST,
            PlacardError::Dependency(_)
            | PlacardError::Render(_)
            | PlacardError::Json(_)
            | PlacardError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
