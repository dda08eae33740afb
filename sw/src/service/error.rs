//! Service failure type

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmError;

/// A failed call to the workflow service
///
/// `message` is shown to the user verbatim; `code` is informational only.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ServiceFailure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Failure with the INVALID_RESPONSE code
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(message).with_code("INVALID_RESPONSE")
    }
}

impl From<LlmError> for ServiceFailure {
    fn from(err: LlmError) -> Self {
        let code = err.code();
        Self::new(err.to_string()).with_code(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_display_is_message_only() {
        let failure = ServiceFailure::new("Failed to process revision request").with_code("REVISION_FAILED");
        assert_eq!(failure.to_string(), "Failed to process revision request");
        assert_eq!(failure.code.as_deref(), Some("REVISION_FAILED"));
    }

    #[test]
    fn test_from_llm_error() {
        let failure: ServiceFailure = LlmError::RateLimited {
            retry_after: Duration::from_secs(5),
        }
        .into();
        assert_eq!(failure.code.as_deref(), Some("RATE_LIMITED"));
        assert!(failure.message.contains("Rate limited"));

        let failure: ServiceFailure = LlmError::ApiError {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(failure.code.as_deref(), Some("API_ERROR"));
    }

    #[test]
    fn test_code_omitted_when_absent() {
        let json = serde_json::to_string(&ServiceFailure::new("x")).unwrap();
        assert_eq!(json, r#"{"message":"x"}"#);
    }
}
