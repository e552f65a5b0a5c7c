//! Engine error types.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from the external model adapters.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Content policy refused the (prompt, reference) pair. Never retried
    /// as-is; the producer swaps the reference image instead.
    #[error("Content policy rejection: {0}")]
    Rejected(String),

    /// Retryable external failure: timeout, rate limit, 5xx, exhausted
    /// local rate budget.
    #[error("Transient engine failure: {0}")]
    Transient(String),

    /// The planner produced output the pipeline cannot use.
    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Check if error is retryable. Rejections and planning failures bypass
    /// retry entirely.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Transient(_) | EngineError::Timeout(_))
    }

    /// Classify an HTTP response status.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status.as_u16() == 429 || status.is_server_error() {
            EngineError::Transient(format!("{}: {}", status, body))
        } else {
            EngineError::InvalidResponse(format!("{}: {}", status, body))
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        // Connection-level failures are transient by construction
        EngineError::Transient(e.to_string())
    }
}
