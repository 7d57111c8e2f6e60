//! Cluster classifiers
//!
//! [`HttpClassifier`] calls a trained model; [`RuleClassifier`] is the
//! threshold fallback used when none is configured.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Classifier, ModelClient, ModelError};
use crate::analytics::clusters::{ClusterFeatures, ClusterPrediction};

/// Remote classifier: `POST {base}/classify` with `{features: [6]}`
pub struct HttpClassifier {
    client: ModelClient,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest {
    features: [f64; 6],
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    cluster_id: u8,
    /// Distance to the cluster centroid
    distance: f64,
}

impl HttpClassifier {
    pub fn new(client: ModelClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    fn name(&self) -> &str {
        "http"
    }

    async fn classify(&self, features: &ClusterFeatures) -> Result<ClusterPrediction, ModelError> {
        let body = ClassifyRequest {
            features: features.to_vector(),
        };
        let response: ClassifyResponse = self.client.post_json("classify", &body).await?;

        if !response.distance.is_finite() || response.distance < 0.0 {
            return Err(ModelError::InvalidResponse(format!(
                "invalid centroid distance {}",
                response.distance
            )));
        }

        Ok(ClusterPrediction {
            cluster_id: response.cluster_id,
            confidence: 1.0 / (1.0 + response.distance),
        })
    }
}

/// Threshold rules, first match wins
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn predict(features: &ClusterFeatures) -> ClusterPrediction {
        let f = features;
        let (cluster_id, confidence) = if f.avg_tir > 70.0 && f.avg_cv < 36.0 && f.avg_tbr < 4.0 {
            (0, 0.85)
        } else if f.avg_tbr > 4.0 {
            (3, 0.80)
        } else if f.avg_cv > 40.0 {
            (2, 0.75)
        } else if f.avg_tir < 50.0 {
            (4, 0.80)
        } else {
            (1, 0.70)
        };

        ClusterPrediction {
            cluster_id,
            confidence,
        }
    }
}

#[async_trait]
impl Classifier for RuleClassifier {
    fn name(&self) -> &str {
        "rules"
    }

    async fn classify(&self, features: &ClusterFeatures) -> Result<ClusterPrediction, ModelError> {
        Ok(Self::predict(features))
    }
}
