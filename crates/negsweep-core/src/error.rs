//! Error taxonomy for the sweep pipeline.
//!
//! Isolation runs category → account → batch. Only [`SweepError::Configuration`]
//! stops a run, and it is raised before any account is touched.

use negsweep_ai::ClassifierError;
use negsweep_platform::PlatformError;

use crate::term::FlagCategory;

/// Errors produced by the sweep pipeline.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SweepError {
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("platform request failed: {0}")]
    PlatformRequest(#[from] PlatformError),

    #[error("AI classifier unavailable, using disqualifier flags only: {0}")]
    ClassifierUnavailable(#[from] ClassifierError),

    #[error("reconciliation failed for {category} list: {detail}")]
    Reconciliation {
        category: FlagCategory,
        detail: String,
    },

    #[error("no {category} list named '{list_name}' and auto-creation is disabled")]
    MissingDestinationList {
        category: FlagCategory,
        list_name: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("run cancelled: {0}")]
    Cancelled(String),
}

/// Result type for sweep operations.
pub type SweepResult<T> = std::result::Result<T, SweepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_not_found_display() {
        let err = SweepError::AccountNotFound("satilla".to_string());
        assert_eq!(err.to_string(), "account not found: satilla");
    }

    #[test]
    fn test_platform_error_converts() {
        let err: SweepError = PlatformError::request("search", "PERMISSION_DENIED").into();
        assert!(matches!(err, SweepError::PlatformRequest(_)));
        assert!(err.to_string().contains("PERMISSION_DENIED"));
    }

    #[test]
    fn test_missing_destination_names_list() {
        let err = SweepError::MissingDestinationList {
            category: FlagCategory::Competitor,
            list_name: "Competitor Terms".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("competitor"));
        assert!(msg.contains("Competitor Terms"));
    }
}
