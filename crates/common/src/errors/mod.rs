//! Error types for InnovAI services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for each collaborator (model, knowledge store)
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,
    PayloadTooLarge,

    // Rate limiting (6xxx)
    RateLimited,

    // Inference errors (7xxx)
    InferenceError,
    InferenceTimeout,
    StructuredOutputError,

    // Knowledge store errors (8xxx)
    UpstreamError,
    StoreUnavailable,
    StoreTimeout,
    StoreQueryError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,
            ErrorCode::PayloadTooLarge => 1004,

            // Rate limits (6xxx)
            ErrorCode::RateLimited => 6001,

            // Inference (7xxx)
            ErrorCode::InferenceError => 7001,
            ErrorCode::InferenceTimeout => 7002,
            ErrorCode::StructuredOutputError => 7003,

            // Knowledge store (8xxx)
            ErrorCode::UpstreamError => 8001,
            ErrorCode::StoreUnavailable => 8002,
            ErrorCode::StoreTimeout => 8003,
            ErrorCode::StoreQueryError => 8004,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Payload too large: {size} characters exceeds limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Inference endpoint errors
    #[error("Inference error: {message}")]
    Inference { message: String, status: Option<u16> },

    #[error("Inference timeout after {timeout_ms}ms")]
    InferenceTimeout { timeout_ms: u64 },

    #[error("Structured output rejected: {message}")]
    StructuredOutput { message: String },

    // Knowledge store errors
    #[error("Knowledge store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Knowledge store timeout after {timeout_ms}ms")]
    StoreTimeout { timeout_ms: u64 },

    #[error("Knowledge store query failed: {message}")]
    StoreQuery { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Inference { .. } => ErrorCode::InferenceError,
            AppError::InferenceTimeout { .. } => ErrorCode::InferenceTimeout,
            AppError::StructuredOutput { .. } => ErrorCode::StructuredOutputError,
            AppError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            AppError::StoreTimeout { .. } => ErrorCode::StoreTimeout,
            AppError::StoreQuery { .. } => ErrorCode::StoreQueryError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } |
            AppError::MissingField { .. } => StatusCode::BAD_REQUEST,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Internal { .. } |
            AppError::Configuration { .. } |
            AppError::Serialization(_) |
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Inference { .. } |
            AppError::StructuredOutput { .. } |
            AppError::StoreQuery { .. } |
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            AppError::InferenceTimeout { .. } |
            AppError::StoreTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Whether the failure is worth retrying against the same upstream
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::StoreUnavailable { .. } => true,
            AppError::Inference { status: Some(s), .. } => *s == 429 || *s >= 500,
            AppError::HttpClient(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            _ => false,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Bound an upstream call, reporting `on_timeout` if it does not finish in time
pub async fn within<T, F>(timeout: Duration, on_timeout: AppError, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout),
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();
        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            AppError::MissingField { field } => Some(field.clone()),
            _ => None,
        };

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}
