//! HTTP client shared by the model adapters
//!
//! JSON POSTs with a request timeout and a bounded retry loop. Connection
//! failures, timeouts, 5xx responses and 429s are retried with a
//! quadratic backoff; exhausting the retries surfaces as
//! [`ModelError::Unavailable`].

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::ModelError;

/// Connection settings for one model endpoint
#[derive(Debug, Clone)]
pub struct ModelClientConfig {
    /// Base URL, e.g. "http://localhost:8501"
    pub base_url: String,
    pub request_timeout_ms: u64,
    /// Total attempts per request
    pub max_retries: u32,
    /// Backoff unit; attempt n waits `n^2` units
    pub retry_backoff_ms: u64,
    /// Upper bound on a server supplied `Retry-After` wait
    pub max_retry_after_ms: u64,
}

impl Default for ModelClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8501".to_string(),
            request_timeout_ms: 10_000,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_retry_after_ms: 10_000,
        }
    }
}

pub struct ModelClient {
    client: Client,
    config: ModelClientConfig,
}

impl ModelClient {
    pub fn new(config: ModelClientConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ModelClientConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// GET `{base}/health`
    pub async fn health_check(&self) -> Result<(), ModelError> {
        self.probe("health").await
    }

    /// GET an arbitrary path and require a 2xx answer
    pub async fn probe(&self, path: &str) -> Result<(), ModelError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(classify_send_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ModelError::Unavailable(format!(
                "{} returned {}",
                path,
                response.status()
            )))
        }
    }

    /// POST a JSON body and decode a JSON response, retrying transient failures
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ModelError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        let attempts = self.config.max_retries.max(1);
        let mut last_error = ModelError::Unavailable(format!("no attempt made to {}", url));

        for attempt in 0..attempts {
            if attempt > 0 {
                // 1, 4, 9... backoff units
                let delay = self.config.retry_backoff_ms * (attempt as u64).pow(2);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let response = match self.client.post(&url).json(body).send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = classify_send_error(e);
                    tracing::warn!(url = %url, attempt = attempt + 1, error = %last_error, "Model request failed");
                    if matches!(last_error, ModelError::Request(_)) {
                        return Err(last_error);
                    }
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return response
                    .json::<R>()
                    .await
                    .map_err(|e| ModelError::InvalidResponse(e.to_string()));
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if let Some(secs) = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                {
                    let wait = retry_after_delay(secs, self.config.max_retry_after_ms);
                    tracing::warn!(url = %url, requested_secs = secs, wait_ms = wait.as_millis() as u64, "Model rate limited");
                    tokio::time::sleep(wait).await;
                }
                last_error = ModelError::RateLimited;
                continue;
            }

            let message = response.text().await.unwrap_or_default();
            last_error = ModelError::ApiError {
                status: status.as_u16(),
                message,
            };
            if !status.is_server_error() {
                return Err(last_error);
            }
            tracing::warn!(url = %url, attempt = attempt + 1, status = status.as_u16(), "Model server error");
        }

        Err(ModelError::Unavailable(format!(
            "{} after {} attempts: {}",
            url, attempts, last_error
        )))
    }
}

/// Server requested wait, capped at `max_ms`
fn retry_after_delay(retry_after_secs: u64, max_ms: u64) -> Duration {
    Duration::from_millis(retry_after_secs.saturating_mul(1000).min(max_ms))
}

fn classify_send_error(e: reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::Timeout
    } else if e.is_connect() {
        ModelError::Unavailable(e.to_string())
    } else {
        ModelError::Request(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelClientConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_timeout_ms, 10_000);
    }

    #[test]
    fn test_url_join() {
        let client = ModelClient::new(ModelClientConfig {
            base_url: "http://models:9000/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.url("/predict"), "http://models:9000/predict");
        assert_eq!(client.url("classify"), "http://models:9000/classify");
    }

    #[tokio::test]
    async fn test_unreachable_exhausts_to_unavailable() {
        // Port 9 (discard) is closed on test hosts; connection is refused
        let client = ModelClient::new(ModelClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout_ms: 500,
            max_retries: 2,
            retry_backoff_ms: 1,
            ..Default::default()
        })
        .unwrap();

        let err = client
            .post_json::<_, serde_json::Value>("predict", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Unavailable(_)));
    }

    #[test]
    fn test_retry_after_is_capped() {
        assert_eq!(retry_after_delay(2, 10_000), Duration::from_secs(2));
        assert_eq!(retry_after_delay(86_400, 10_000), Duration::from_secs(10));
        assert_eq!(retry_after_delay(u64::MAX, 50), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_rate_limited_server_does_not_stall() {
        use axum::{
            http::{header, StatusCode as AxumStatus},
            routing::post,
            Router,
        };

        let app = Router::new().route(
            "/predict",
            post(|| async { (AxumStatus::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "86400")], "slow down") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = ModelClient::new(ModelClientConfig {
            base_url: format!("http://{}", addr),
            request_timeout_ms: 1_000,
            max_retries: 2,
            retry_backoff_ms: 1,
            max_retry_after_ms: 5,
        })
        .unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            client.post_json::<_, serde_json::Value>("predict", &serde_json::json!({})),
        )
        .await
        .expect("rate limit wait was not capped");
        assert!(matches!(result.unwrap_err(), ModelError::Unavailable(_)));
    }
}
