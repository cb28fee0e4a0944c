//! Error types for the model gateway.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

// ─────────────────────────────────────────────────────────────────────────────
// Rate Limit Info
// ─────────────────────────────────────────────────────────────────────────────

/// Information about a rate limit error.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// The error message from the provider.
    pub message: String,
    /// How long to wait before retrying (if the provider specified).
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Build from a provider message and an optional `retry-after` header.
    pub fn from_header(message: impl Into<String>, retry_after_header: Option<&str>) -> Self {
        Self {
            message: message.into(),
            retry_after: retry_after_header.and_then(parse_retry_after_header),
        }
    }
}

impl std::fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(retry_after) = self.retry_after {
            write!(f, " (retry after {:.2}s)", retry_after.as_secs_f64())?;
        }
        Ok(())
    }
}

/// Parse a Retry-After header value given in seconds.
fn parse_retry_after_header(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure Classification
// ─────────────────────────────────────────────────────────────────────────────

/// How the orchestration loop should treat a gateway failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Worth retrying with backoff.
    Transient,
    /// Aborts the turn.
    Fatal,
}

/// Error type for model gateway operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Backend/API error from the provider.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Network/connectivity error (retryable).
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error (API key missing, etc.).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid request parameters, or a response the gateway cannot interpret.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded (retryable with backoff).
    #[error("Rate limit exceeded: {0}")]
    RateLimit(RateLimitInfo),

    /// Authentication failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Provider is temporarily overloaded (retryable).
    #[error("Provider overloaded: {0}")]
    Overloaded(String),

    /// Request did not complete within its deadline (retryable).
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LlmError {
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit(RateLimitInfo::new(message))
    }

    /// Get the retry-after duration if this is a rate limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit(info) => info.retry_after,
            _ => None,
        }
    }

    /// Classify the failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network(_) | Self::RateLimit(_) | Self::Overloaded(_) | Self::Timeout(_) => {
                FailureKind::Transient
            }
            Self::Backend(_)
            | Self::Config(_)
            | Self::Serialization(_)
            | Self::InvalidRequest(_)
            | Self::Auth(_)
            | Self::Internal(_) => FailureKind::Fatal,
        }
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("Connection failed: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            LlmError::Network("reset".to_string()).kind(),
            FailureKind::Transient
        );
        assert!(LlmError::rate_limit("slow down").is_retryable());
        assert!(LlmError::Overloaded("529".to_string()).is_retryable());
        assert!(LlmError::Timeout(Duration::from_secs(1)).is_retryable());
        assert_eq!(
            LlmError::Auth("bad key".to_string()).kind(),
            FailureKind::Fatal
        );
        assert!(!LlmError::InvalidRequest("no content".to_string()).is_retryable());
        assert!(!LlmError::Backend("400".to_string()).is_retryable());
    }

    #[test]
    fn test_retry_after_header() {
        let info = RateLimitInfo::from_header("limited", Some(" 10 "));
        assert_eq!(info.retry_after, Some(Duration::from_secs(10)));
        assert!(info.to_string().contains("retry after 10.00s"));

        let info = RateLimitInfo::from_header("limited", Some("soon"));
        assert!(info.retry_after.is_none());

        let err = LlmError::RateLimit(RateLimitInfo::from_header("x", Some("3")));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }
}
