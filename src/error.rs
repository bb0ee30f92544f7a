//! Error types for GroupWatch
//!
//! Every fallible operation in the crate returns [`Result`], backed by
//! [`WatchError`]. Generation backend failures are classified separately in
//! [`GenerationError`] so the reply pipeline can decide whether to trip the
//! circuit breaker or go straight to the fallback generator.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Generation Error Classification
// ============================================================================

/// Structured classification of generation backend failures.
#[derive(Debug)]
pub enum GenerationError {
    /// 401/403: invalid or missing API key
    Auth(String),
    /// 429: rate limit or quota exceeded
    RateLimit(String),
    /// 5xx: server-side failure
    ServerError(String),
    /// 400: malformed request
    InvalidRequest(String),
    /// 404: model or endpoint missing
    ModelNotFound(String),
    /// The call did not finish within the configured deadline
    Timeout(String),
    /// Backend answered but produced nothing usable
    EmptyResponse,
    /// No backend configured at all
    Unavailable,
    /// Anything else
    Unknown(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            GenerationError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            GenerationError::ServerError(msg) => write!(f, "Server error: {}", msg),
            GenerationError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            GenerationError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            GenerationError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            GenerationError::EmptyResponse => write!(f, "Backend returned an empty reply"),
            GenerationError::Unavailable => write!(f, "No generation backend configured"),
            GenerationError::Unknown(msg) => write!(f, "Unknown generation error: {}", msg),
        }
    }
}

impl GenerationError {
    /// Returns `true` for transient failures worth retrying later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimit(_)
                | GenerationError::ServerError(_)
                | GenerationError::Timeout(_)
        )
    }

    /// Returns `true` if this failure should count against the backend's
    /// circuit breaker.
    ///
    /// Configuration mistakes (bad key, bad request, unknown model) will fail
    /// every call identically, so they count too; an absent backend does not,
    /// since there is nothing to protect.
    pub fn counts_as_backend_failure(&self) -> bool {
        !matches!(self, GenerationError::Unavailable)
    }

    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GenerationError::Auth(_) => Some(401),
            GenerationError::RateLimit(_) => Some(429),
            GenerationError::ServerError(_) => Some(500),
            GenerationError::InvalidRequest(_) => Some(400),
            GenerationError::ModelNotFound(_) => Some(404),
            _ => None,
        }
    }
}

impl From<GenerationError> for WatchError {
    fn from(err: GenerationError) -> Self {
        WatchError::Generation(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for GroupWatch operations.
#[derive(Error, Debug)]
pub enum WatchError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Adapter unreachable, disconnected or failing
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// Adapter does not implement the requested operation
    #[error("Capability unsupported: {0}")]
    CapabilityUnsupported(&'static str),

    /// Outbound delivery failed or was refused
    #[error("Send error: {0}")]
    Send(String),

    /// Classified generation backend failure
    #[error("Generation error: {0}")]
    Generation(GenerationError),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl WatchError {
    /// Adapter-level problems the service survives in degraded mode.
    pub fn is_adapter_unavailable(&self) -> bool {
        matches!(
            self,
            WatchError::Adapter(_) | WatchError::CapabilityUnsupported(_)
        )
    }
}

/// A specialized `Result` type for GroupWatch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WatchError::Config("missing bot token".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing bot token");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: WatchError = io_err.into();
        assert!(matches!(err, WatchError::Io(_)));
    }

    #[test]
    fn test_capability_unsupported_display() {
        let err = WatchError::CapabilityUnsupported("fetch_history");
        assert_eq!(err.to_string(), "Capability unsupported: fetch_history");
        assert!(err.is_adapter_unavailable());
    }

    #[test]
    fn test_send_error_is_not_adapter_unavailable() {
        assert!(!WatchError::Send("timeout".into()).is_adapter_unavailable());
        assert!(WatchError::Adapter("disconnected".into()).is_adapter_unavailable());
    }

    #[test]
    fn test_generation_error_conversion() {
        let err: WatchError = GenerationError::Timeout("20s".into()).into();
        assert!(matches!(err, WatchError::Generation(GenerationError::Timeout(_))));
        assert_eq!(err.to_string(), "Generation error: Timeout: 20s");
    }

    #[test]
    fn test_generation_error_retryable() {
        assert!(GenerationError::RateLimit("quota".into()).is_retryable());
        assert!(GenerationError::ServerError("502".into()).is_retryable());
        assert!(GenerationError::Timeout("slow".into()).is_retryable());
        assert!(!GenerationError::Auth("bad key".into()).is_retryable());
        assert!(!GenerationError::EmptyResponse.is_retryable());
        assert!(!GenerationError::Unavailable.is_retryable());
    }

    #[test]
    fn test_generation_error_breaker_accounting() {
        assert!(GenerationError::Auth("bad".into()).counts_as_backend_failure());
        assert!(GenerationError::EmptyResponse.counts_as_backend_failure());
        assert!(!GenerationError::Unavailable.counts_as_backend_failure());
    }

    #[test]
    fn test_generation_error_status_code() {
        assert_eq!(GenerationError::Auth("x".into()).status_code(), Some(401));
        assert_eq!(GenerationError::RateLimit("x".into()).status_code(), Some(429));
        assert_eq!(GenerationError::ModelNotFound("x".into()).status_code(), Some(404));
        assert_eq!(GenerationError::Timeout("x".into()).status_code(), None);
    }
}
