//! Clip source error types.

use thiserror::Error;

/// Result type for clip source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors that can occur while searching or downloading clips.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Rate limited by clip source")]
    RateLimited,

    #[error("Clip {0} has no downloadable file")]
    NoDownloadUrl(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SourceError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            429 => Self::RateLimited,
            _ => Self::Status {
                status,
                message: message.into(),
            },
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Network(_) | SourceError::RateLimited => true,
            SourceError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_http_status() {
        assert!(matches!(SourceError::from_http_status(429, "slow down"), SourceError::RateLimited));
        assert!(SourceError::from_http_status(503, "unavailable").is_retryable());
        assert!(!SourceError::from_http_status(401, "bad key").is_retryable());
        assert!(!SourceError::NoDownloadUrl("1".into()).is_retryable());
    }
}
