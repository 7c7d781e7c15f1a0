//! Failure taxonomy for outbound platform calls
//!
//! Every adapter failure is classified into one of these variants before it
//! leaves the adapter; the retry executor and the orchestrator only ever
//! branch on the variant, never on transport details.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The platform definitively reported that no such account exists.
    #[error("account not found")]
    NotFound,

    /// The platform explicitly signalled throttling (HTTP 429 or equivalent).
    #[error("rate limited by remote")]
    RateLimited,

    /// Network failure, timeout, 5xx, or malformed response. Worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Credentials missing, rejected, or a warm-up step failed. Fatal for
    /// the platform's entire run.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Anything that retrying cannot fix.
    #[error("fatal failure: {0}")]
    Fatal(String),

    /// The run was cancelled before or during this call.
    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether the retry executor should attempt this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient(_))
    }

    /// Classify a transport-level reqwest failure.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::Transient(format!("network error: {err}"))
        } else {
            Self::Transient(err.to_string())
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            StatusCode::NOT_FOUND => Self::NotFound,
            s if s.is_server_error() => Self::Transient(format!("server error {s}: {body}")),
            s => Self::Transient(format!("unexpected status {s}: {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_and_transients_are_retryable() {
        assert!(FetchError::RateLimited.is_retryable());
        assert!(FetchError::Transient("timeout".into()).is_retryable());
    }

    #[test]
    fn definitive_failures_are_not_retryable() {
        assert!(!FetchError::NotFound.is_retryable());
        assert!(!FetchError::Auth("bad key".into()).is_retryable());
        assert!(!FetchError::Fatal("nope".into()).is_retryable());
        assert!(!FetchError::Cancelled.is_retryable());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            FetchError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            FetchError::RateLimited
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::NOT_FOUND, ""),
            FetchError::NotFound
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::BAD_GATEWAY, "upstream"),
            FetchError::Transient(_)
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::FORBIDDEN, ""),
            FetchError::Transient(_)
        ));
    }
}
