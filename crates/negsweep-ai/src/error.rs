//! Error types for negsweep-ai

use thiserror::Error;

/// Errors produced while asking an AI model to classify search terms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    /// API key or model settings missing
    #[error("classifier configuration error: {0}")]
    Config(String),

    /// Transport-level failure
    #[error("classifier request failed: {0}")]
    Network(String),

    /// The API answered with a non-success status or no choices
    #[error("classifier API error: {0}")]
    Api(String),

    /// The completion did not match the verdict schema
    #[error("classifier response failed schema validation: {0}")]
    Schema(String),
}

impl From<reqwest::Error> for ClassifierError {
    fn from(err: reqwest::Error) -> Self {
        ClassifierError::Network(err.to_string())
    }
}

/// Result type for classifier operations.
pub type ClassifierResult<T> = std::result::Result<T, ClassifierError>;
