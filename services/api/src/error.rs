//! services/api/src/error.rs
//!
//! Defines the primary error type for the API service, and the mapping of
//! flow errors onto HTTP responses.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;
use value_coach_core::FlowError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while running the database migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A `FlowError` on its way out of a handler.
#[derive(Debug)]
pub struct HttpError(pub FlowError);

impl From<FlowError> for HttpError {
    fn from(err: FlowError) -> Self {
        Self(err)
    }
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            FlowError::NotFound(_) => StatusCode::NOT_FOUND,
            FlowError::InvalidStage(_) | FlowError::Validation(_) => StatusCode::BAD_REQUEST,
            FlowError::Conflict(_) => StatusCode::CONFLICT,
            FlowError::GenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            FlowError::GenerationFailure(_) => StatusCode::BAD_GATEWAY,
            FlowError::Configuration(_) | FlowError::OutOfRange { .. } | FlowError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        // Internal details stay in the logs.
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            _ => self.0.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
