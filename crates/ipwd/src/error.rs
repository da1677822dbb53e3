//! Error types for the daemon

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ipw_core::{ConfigError, StageError};
use thiserror::Error;

/// Daemon lifecycle errors
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}

pub type DaemonResult<T> = Result<T, DaemonError>;

/// Request-level errors, rendered as plain-text HTTP responses
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("404 not found.")]
    NotFound,

    #[error("Method is not supported.")]
    MethodNotSupported,

    #[error("Bad Request")]
    BadRequest(#[source] serde_json::Error),

    #[error("could not read request body: {0}")]
    UnreadableBody(String),

    #[error("review chain failed: {0}")]
    Stage(#[from] StageError),

    #[error("review chain misconfigured: {0}")]
    Config(#[from] ConfigError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound | ApiError::MethodNotSupported => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnreadableBody(_) | ApiError::Stage(_) | ApiError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::NotFound | ApiError::MethodNotSupported => {
                tracing::debug!(error = %self, "request rejected")
            }
            ApiError::BadRequest(err) => tracing::warn!(error = %err, "Error in JSON data"),
            _ => tracing::error!(error = %self, "request failed"),
        }

        // Internal details stay in the log.
        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };
        (status, body).into_response()
    }
}
