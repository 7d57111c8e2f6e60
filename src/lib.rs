//! # glycotrack
//!
//! Glucose trend analytics and alerting for people with type 1 diabetes.
//!
//! ## Features
//!
//! - **Daily metrics**: time in range, variability and GMI per patient-day
//! - **Forecast alerts**: hypo/hyperglycemia alerts over model predictions
//! - **Patient clustering**: five control profiles with tailored recommendations
//! - **Chat assistant**: topic-restricted diabetes Q&A grounded on a reference guide
//!
//! ## Modules
//!
//! - [`analytics`]: Metrics, alerts, forecasts, clusters and recommendations
//! - [`models`]: Forecaster and classifier seams with HTTP adapters
//! - [`store`]: SQLite persistence for patients, readings, metrics and foods
//! - [`chat`]: Conversation sessions, topic filter and LLM adapter
//! - [`scheduler`]: Background daily metrics recompute
//! - [`import`]: CSV import of glucose readings
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glycotrack::analytics::{compute_daily_metrics, GlucoseReading};
//! use chrono::{Duration, Utc};
//!
//! let start = Utc::now() - Duration::hours(1);
//! let readings: Vec<_> = (0..12i64)
//!     .map(|i| GlucoseReading::new("P001", start + Duration::minutes(5 * i), 110.0 + i as f64))
//!     .collect();
//!
//! let metrics = compute_daily_metrics(&readings)?;
//! println!("TIR {:.1}%  GMI {:.2}%", metrics.time_in_range, metrics.gmi);
//! # Ok::<(), glycotrack::analytics::AnalyticsError>(())
//! ```

pub mod analytics;
pub mod api;
pub mod chat;
pub mod config;
pub mod import;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod store;

// Re-export top-level types for convenience
pub use analytics::{
    compute_daily_metrics, evaluate_alerts, Alert, AnalyticsError, DailyMetrics, ForecastResult,
    GlucoseReading, GlucoseUnit, PatientAnalysis, PatientAnalyzer,
};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use chat::{ChatService, ReferenceGuide, SessionManager};

pub use config::{Config, ConfigError, LoggingConfig};

pub use import::{ImportError, ImportResult, ReadingCsvImporter};

pub use models::{Classifier, Forecaster, ModelClient, ModelError};

pub use scheduler::{MetricsScheduler, RunSummary, SchedulerStatus};

pub use store::{SqliteStore, StoreError};
