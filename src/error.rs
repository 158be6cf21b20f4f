//! # Error Handling
//!
//! HTTP-facing error taxonomy and its conversion into JSON responses.
//!
//! ## Error Categories:
//! - **Internal**: Server-side problems, including storage failures (500)
//! - **BadRequest**: Client sent malformed data (400)
//! - **NotFound**: Unknown interview or resource (404)
//! - **ConfigError**: Configuration problems (500)
//! - **ValidationError**: Input failed validation rules (400)
//! - **Conflict**: Request clashes with the interview's lifecycle (409)
//! - **DataIntegrity**: A stored record failed validation on read (500)
//!
//! ## JSON Response Format:
//! ```json
//! {
//!   "error": {
//!     "type": "validation_error",
//!     "message": "At least one skill is required",
//!     "timestamp": "2025-01-01T12:00:00Z"
//!   }
//! }
//! ```

use crate::store::StoreError;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Internal(String),
    BadRequest(String),
    NotFound(String),
    ConfigError(String),
    ValidationError(String),
    Conflict(String),
    DataIntegrity(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::DataIntegrity(msg) => write!(f, "Data integrity error: {}", msg),
        }
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.as_str()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.as_str()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.as_str()),
            AppError::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg.as_str()),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.as_str()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.as_str()),
            AppError::DataIntegrity(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "data_integrity_error", msg.as_str())
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = self.parts();
        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
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

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownInterview(id) => {
                AppError::NotFound(format!("Interview {} not found", id))
            }
            StoreError::Validation(msg) => AppError::ValidationError(msg),
            err @ StoreError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            err @ StoreError::DuplicateMessage(_) => AppError::Conflict(err.to_string()),
            err @ StoreError::DataIntegrity { .. } => {
                tracing::error!("Data integrity failure: {}", err);
                AppError::DataIntegrity(err.to_string())
            }
            other => {
                tracing::error!("Storage failure: {}", other);
                AppError::Internal("Storage failure".to_string())
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
