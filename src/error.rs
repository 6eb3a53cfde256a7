// src/error.rs
use thiserror::Error;
use actix_web::{http::StatusCode, ResponseError, HttpResponse};
use serde_json::json;

#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("cannot find usage record with id: {0}")]
    UsageNotFound(String),

    #[error("resource unauthorized")]
    ResourceUnauthorized,

    #[error("resource unavailable")]
    ResourceUnavailable,

    #[error("duplicate resource usage with id: {0}")]
    DuplicateUsage(String),

    #[error("lock acquire timeout on: {0}")]
    LockTimeout(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("filter error: {0}")]
    Filter(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for AdmissionError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        HttpResponse::build(status_code).json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AdmissionError::NotFound(_) | AdmissionError::UsageNotFound(_) => StatusCode::NOT_FOUND,
            AdmissionError::ResourceUnauthorized => StatusCode::FORBIDDEN,
            AdmissionError::ResourceUnavailable => StatusCode::TOO_MANY_REQUESTS,
            AdmissionError::DuplicateUsage(_) => StatusCode::CONFLICT,
            AdmissionError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AdmissionError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl AdmissionError {
    fn error_code(&self) -> &str {
        match self {
            AdmissionError::NotFound(_) => "not_found",
            AdmissionError::UsageNotFound(_) => "usage_not_found",
            AdmissionError::ResourceUnauthorized => "resource_unauthorized",
            AdmissionError::ResourceUnavailable => "resource_unavailable",
            AdmissionError::DuplicateUsage(_) => "duplicate_usage",
            AdmissionError::LockTimeout(_) => "lock_timeout",
            AdmissionError::Persistence(_) => "persistence_error",
            AdmissionError::Filter(_) => "filter_error",
            AdmissionError::InvalidRequest(_) => "invalid_request",
            AdmissionError::Internal(_) => "internal_error",
        }
    }

    /// Lock timeouts leave no partial state behind, so callers may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdmissionError::LockTimeout(_))
    }
}

impl From<redis::RedisError> for AdmissionError {
    fn from(err: redis::RedisError) -> Self {
        AdmissionError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for AdmissionError {
    fn from(err: serde_json::Error) -> Self {
        AdmissionError::Persistence(err.to_string())
    }
}
