//! Error taxonomy surfaced at the feature boundary.
//!
//! Every failure a feature can hit collapses into one of four kinds. None of
//! them is retried automatically; the controller records the message on its
//! view and the next user action is the retry.

use thiserror::Error;

use crate::store::{SchemaError, StoreError};

/// Errors reported to the user by feature controllers and services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// An operation was attempted with no active session.
    #[error("Please sign in to use this feature.")]
    AuthRequired,

    /// The document store or network failed.
    #[error("Service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Required form fields were missing or malformed.
    #[error("{0}")]
    ValidationFailed(String),

    /// The AI endpoint returned a non-2xx status or an unusable body.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationFailed(message.into())
    }

    pub fn generation(message: impl Into<String>) -> Self {
        AppError::GenerationFailed(message.into())
    }

    /// True for errors that should replace the whole feature view with a
    /// login prompt rather than an inline message.
    pub fn gates_view(&self) -> bool {
        matches!(self, AppError::AuthRequired)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::UpstreamUnavailable(e.to_string())
    }
}

impl From<SchemaError> for AppError {
    fn from(e: SchemaError) -> Self {
        AppError::UpstreamUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_required_gates_view() {
        assert!(AppError::AuthRequired.gates_view());
        assert!(!AppError::validation("name is required").gates_view());
    }

    #[test]
    fn test_store_error_becomes_upstream_unavailable() {
        let err: AppError = StoreError::Unavailable("connection reset".to_string()).into();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            AppError::generation("bad json").to_string(),
            "Generation failed: bad json"
        );
        assert_eq!(
            AppError::validation("Dose is required").to_string(),
            "Dose is required"
        );
    }
}
