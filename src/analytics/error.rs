//! Analytics error types
//!
//! The four user-visible failure conditions of the analytics core, plus
//! pass-through of store failures for operations that read persisted data.

use thiserror::Error;

use crate::models::ModelError;
use crate::store::StoreError;

/// Errors produced by the analytics core
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Malformed or out-of-range input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not enough observations to compute a result
    #[error("Insufficient data: found {found} {what}, at least {required} required")]
    InsufficientData {
        what: &'static str,
        found: usize,
        required: usize,
    },

    /// An opaque model could not be reached or is not configured
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Aggregation produced a non-finite or otherwise unusable result
    #[error("Computation error: {0}")]
    Computation(String),

    /// Persistence failure while loading or saving analytics data
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AnalyticsError {
    pub(crate) fn readings(found: usize, required: usize) -> Self {
        AnalyticsError::InsufficientData {
            what: "readings",
            found,
            required,
        }
    }

    pub(crate) fn days(found: usize, required: usize) -> Self {
        AnalyticsError::InsufficientData {
            what: "days of metrics",
            found,
            required,
        }
    }
}

impl From<ModelError> for AnalyticsError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidResponse(msg) => AnalyticsError::Computation(msg),
            other => AnalyticsError::ModelUnavailable(other.to_string()),
        }
    }
}

/// Result type alias for analytics operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalyticsError::readings(9, 10);
        assert_eq!(
            err.to_string(),
            "Insufficient data: found 9 readings, at least 10 required"
        );

        let err = AnalyticsError::Validation("history must contain 12 records".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: history must contain 12 records"
        );
    }

    #[test]
    fn test_model_error_conversion() {
        let err: AnalyticsError = ModelError::Timeout.into();
        assert!(matches!(err, AnalyticsError::ModelUnavailable(_)));

        let err: AnalyticsError = ModelError::InvalidResponse("3 values for 4 steps".into()).into();
        assert!(matches!(err, AnalyticsError::Computation(_)));
    }
}
