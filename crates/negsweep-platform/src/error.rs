//! Error types for negsweep-platform

use thiserror::Error;

/// Errors surfaced by an ad platform backend.
///
/// Every variant describes a single failed remote call. Callers never retry;
/// the error is reported once against the account or category it belongs to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Credentials were rejected or the token exchange failed
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The platform refused the call because a rate or quota limit was hit
    #[error("quota exceeded during {operation}: {detail}")]
    Quota { operation: String, detail: String },

    /// The platform returned an error for a well-formed call
    #[error("{operation} failed: {detail}")]
    Request { operation: String, detail: String },

    /// A response arrived but did not have the expected shape
    #[error("could not decode {operation} response: {detail}")]
    Decode { operation: String, detail: String },

    /// Transport-level failure (DNS, TLS, connection reset, timeout)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Backend configuration is incomplete
    #[error("platform configuration error: {0}")]
    Config(String),
}

impl PlatformError {
    /// Shorthand for a [`PlatformError::Request`].
    pub fn request(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        PlatformError::Request {
            operation: operation.into(),
            detail: detail.into(),
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        PlatformError::Http(err.to_string())
    }
}
