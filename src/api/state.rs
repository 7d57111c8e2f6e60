//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analytics::PatientAnalyzer;
use crate::chat::ChatService;
use crate::models::{Classifier, Forecaster};
use crate::scheduler::MetricsScheduler;
use crate::store::SqliteStore;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Patients, readings, metrics and the food catalog
    pub store: Arc<SqliteStore>,
    /// Patient analysis with the configured classifier
    pub analyzer: Arc<PatientAnalyzer>,
    /// Forecasting model; forecasts return 503 without one
    pub forecaster: Option<Arc<dyn Forecaster>>,
    /// Chat assistant (optional)
    pub chat: Option<Arc<ChatService>>,
    /// Daily metrics scheduler (optional)
    pub scheduler: Option<Arc<MetricsScheduler>>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create an AppState with only the store and a classifier
    pub fn new(store: Arc<SqliteStore>, classifier: Arc<dyn Classifier>, config: ApiConfig) -> Self {
        Self {
            analyzer: Arc::new(PatientAnalyzer::new(Arc::clone(&store), classifier)),
            store,
            forecaster: None,
            chat: None,
            scheduler: None,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    pub fn with_forecaster(mut self, forecaster: Arc<dyn Forecaster>) -> Self {
        self.forecaster = Some(forecaster);
        self
    }

    pub fn with_chat(mut self, chat: Arc<ChatService>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<MetricsScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Readings returned by the list endpoint when no limit is given
    pub default_reading_limit: usize,
    /// Allowed CORS origins; empty or `*` allows any
    pub cors_origins: Vec<String>,
    /// Requests running longer than this get 408
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_size: 10 * 1024 * 1024, // 10MB
            default_reading_limit: 100,
            cors_origins: Vec::new(),
            request_timeout_secs: 120,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Zero is treated as one second
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_config_builders() {
        let config = ApiConfig::new("127.0.0.1", 9000)
            .with_cors_origins(vec!["http://localhost:3000".to_string()])
            .with_request_timeout(45);
        assert_eq!(config.addr(), "127.0.0.1:9000");
        assert_eq!(config.cors_origins.len(), 1);
        assert_eq!(config.request_timeout(), Duration::from_secs(45));

        let config = ApiConfig::default().with_request_timeout(0);
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
