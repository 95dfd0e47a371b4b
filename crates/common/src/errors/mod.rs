//! Error types for the partsbot core
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - Structured error responses
//! - Error codes for client handling

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,

    // Resource errors (4xxx)
    NotFound,
    SessionNotFound,

    // Store errors (7xxx)
    CatalogError,
    ConversationError,

    // External service errors (8xxx)
    UpstreamError,
    NormalizationError,
    NormalizationTimeout,

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
            ErrorCode::InvalidFormat => 1002,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::SessionNotFound => 4002,

            // Stores (7xxx)
            ErrorCode::CatalogError => 7001,
            ErrorCode::ConversationError => 7002,

            // External (8xxx)
            ErrorCode::UpstreamError => 8001,
            ErrorCode::NormalizationError => 8002,
            ErrorCode::NormalizationTimeout => 8003,

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

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    // Store errors (propagated unchanged from collaborators)
    #[error("Catalog store error: {message}")]
    CatalogError { message: String },

    #[error("Conversation store error: {message}")]
    ConversationError { message: String },

    // External service errors
    #[error("Normalization service error: {message}")]
    NormalizationError { message: String },

    #[error("Normalization timeout after {timeout_ms}ms")]
    NormalizationTimeout { timeout_ms: u64 },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
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
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::SessionNotFound { .. } => ErrorCode::SessionNotFound,
            AppError::CatalogError { .. } => ErrorCode::CatalogError,
            AppError::ConversationError { .. } => ErrorCode::ConversationError,
            AppError::NormalizationError { .. } => ErrorCode::NormalizationError,
            AppError::NormalizationTimeout { .. } => ErrorCode::NormalizationTimeout,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Check if this error originated in an external collaborator
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AppError::CatalogError { .. }
                | AppError::ConversationError { .. }
                | AppError::NormalizationError { .. }
                | AppError::NormalizationTimeout { .. }
                | AppError::HttpClient(_)
        )
    }
}

/// Structured error response for collaborators
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        ErrorResponse {
            error: ErrorDetails {
                code: err.code(),
                message: err.to_string(),
                details: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::SessionNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::SessionNotFound);
        assert_eq!(err.code().as_code(), 4002);
    }

    #[test]
    fn test_upstream_classification() {
        let err = AppError::CatalogError {
            message: "connection refused".into(),
        };
        assert!(err.is_upstream());

        let err = AppError::Validation {
            message: "bad query".into(),
            field: None,
        };
        assert!(!err.is_upstream());
    }

    #[test]
    fn test_error_response_shape() {
        let err = AppError::NormalizationTimeout { timeout_ms: 5000 };
        let resp = ErrorResponse::from(&err);
        assert_eq!(resp.error.code, ErrorCode::NormalizationTimeout);
        assert!(resp.error.message.contains("5000"));
    }
}
