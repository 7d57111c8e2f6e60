//! Remote forecaster
//!
//! `POST {base}/predict` with `{history, future, steps}`; the runtime
//! answers `{predictions: [f64]}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Forecaster, ModelClient, ModelError};
use crate::analytics::forecast::{FeatureRow, ForecastInput};

pub struct HttpForecaster {
    client: ModelClient,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    history: &'a [FeatureRow],
    future: &'a [FeatureRow],
    steps: usize,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<f64>,
}

impl HttpForecaster {
    pub fn new(client: ModelClient) -> Self {
        Self { client }
    }

    pub async fn health_check(&self) -> Result<(), ModelError> {
        self.client.health_check().await
    }
}

#[async_trait]
impl Forecaster for HttpForecaster {
    fn name(&self) -> &str {
        "http"
    }

    async fn predict(&self, input: &ForecastInput) -> Result<Vec<f64>, ModelError> {
        let body = PredictRequest {
            history: &input.history,
            future: &input.future,
            steps: input.steps(),
        };

        let response: PredictResponse = self.client.post_json("predict", &body).await?;

        if let Some(bad) = response.predictions.iter().find(|v| !v.is_finite()) {
            return Err(ModelError::InvalidResponse(format!(
                "non-finite prediction {}",
                bad
            )));
        }

        Ok(response.predictions)
    }
}
