//! # Error Handling
//!
//! Application-level error taxonomy and its mapping to HTTP responses.
//!
//! Load failures surface as 503 (the model backend is the unavailable
//! dependency), inference failures as 500, client mistakes as 400/404. All
//! responses share one JSON shape so API clients can handle them uniformly.

use crate::manager::ManagerError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// The model could not be loaded (backend down, model id unknown, ...).
    ResourceUnavailable(String),

    /// The model ran but produced no usable transcription.
    InferenceFailed(String),

    /// Client sent invalid or malformed data.
    BadRequest(String),

    /// Requested resource (e.g. model id) does not exist here.
    NotFound(String),

    /// Configuration file or environment problems.
    ConfigError(String),

    /// Anything else server-side.
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ResourceUnavailable(msg) => write!(f, "model unavailable: {}", msg),
            AppError::InferenceFailed(msg) => write!(f, "transcription failed: {}", msg),
            AppError::BadRequest(msg) => write!(f, "bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::ResourceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "resource_unavailable",
                msg.clone(),
            ),
            AppError::InferenceFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "inference_failed",
                msg.clone(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::ConfigError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                msg.clone(),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<ManagerError> for AppError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::ResourceUnavailable(msg) => AppError::ResourceUnavailable(msg),
            ManagerError::InferenceFailed(msg) => AppError::InferenceFailed(msg),
            ManagerError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_errors_map_to_http_categories() {
        let unavailable: AppError =
            ManagerError::ResourceUnavailable("backend offline".to_string()).into();
        assert_eq!(
            unavailable.error_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        let failed: AppError = ManagerError::InferenceFailed("no output".to_string()).into();
        assert_eq!(
            failed.error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn client_errors_keep_4xx_status() {
        assert_eq!(
            AppError::BadRequest("empty payload".to_string())
                .error_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("unknown model".to_string())
                .error_response()
                .status(),
            StatusCode::NOT_FOUND
        );
    }
}
