//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::Network(_) => true,
            LlmError::Timeout(_) => true,
            LlmError::InvalidResponse(_) => false,
            LlmError::Json(_) => false,
        }
    }

    /// Short machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            LlmError::RateLimited { .. } => "RATE_LIMITED",
            LlmError::ApiError { .. } => "API_ERROR",
            LlmError::Network(_) => "NETWORK",
            LlmError::InvalidResponse(_) => "INVALID_RESPONSE",
            LlmError::Timeout(_) => "TIMEOUT",
            LlmError::Json(_) => "INVALID_RESPONSE",
        }
    }
}
