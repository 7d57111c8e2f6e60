//! Model adapters
//!
//! The forecaster and the cluster classifier are opaque models reached
//! over HTTP. The analytics core only sees the [`Forecaster`] and
//! [`Classifier`] traits, so deterministic stubs can stand in for tests.

mod classifier;
mod client;
mod forecaster;

pub use classifier::{HttpClassifier, RuleClassifier};
pub use client::{ModelClient, ModelClientConfig};
pub use forecaster::HttpForecaster;

use async_trait::async_trait;
use thiserror::Error;

use crate::analytics::clusters::{ClusterFeatures, ClusterPrediction};
use crate::analytics::forecast::ForecastInput;

/// Sequence-to-sequence glucose model
#[async_trait]
pub trait Forecaster: Send + Sync {
    fn name(&self) -> &str;

    /// One predicted mg/dL value per future row of `input`
    async fn predict(&self, input: &ForecastInput) -> Result<Vec<f64>, ModelError>;
}

/// Patient-behavior classifier over averaged daily metrics
#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, features: &ClusterFeatures) -> Result<ClusterPrediction, ModelError>;
}

/// Errors from a model runtime
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Model API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Model request timeout")]
    Timeout,

    #[error("Model rate limited")]
    RateLimited,

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic model stubs

    use super::*;

    /// Returns a fixed prediction vector regardless of input
    pub struct FixedForecaster {
        predictions: Vec<f64>,
    }

    impl FixedForecaster {
        pub fn new(predictions: Vec<f64>) -> Self {
            Self { predictions }
        }
    }

    #[async_trait]
    impl Forecaster for FixedForecaster {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn predict(&self, _input: &ForecastInput) -> Result<Vec<f64>, ModelError> {
            Ok(self.predictions.clone())
        }
    }

    /// Always unavailable
    pub struct FailingForecaster;

    #[async_trait]
    impl Forecaster for FailingForecaster {
        fn name(&self) -> &str {
            "failing"
        }

        async fn predict(&self, _input: &ForecastInput) -> Result<Vec<f64>, ModelError> {
            Err(ModelError::Unavailable("model not loaded".to_string()))
        }
    }

    /// Returns a fixed cluster
    pub struct FixedClassifier {
        prediction: ClusterPrediction,
    }

    impl FixedClassifier {
        pub fn new(cluster_id: u8, confidence: f64) -> Self {
            Self {
                prediction: ClusterPrediction {
                    cluster_id,
                    confidence,
                },
            }
        }
    }

    #[async_trait]
    impl Classifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn classify(
            &self,
            _features: &ClusterFeatures,
        ) -> Result<ClusterPrediction, ModelError> {
            Ok(self.prediction)
        }
    }
}
