//! Glucose analytics core
//!
//! Daily metrics, forecast alerts, cluster assignment, recommendations
//! and patient analysis. Opaque models are injected through the traits
//! in [`crate::models`]; persisted data comes from [`crate::store`].

pub mod alerts;
pub mod clusters;
mod error;
pub mod forecast;
pub mod metrics;
pub mod patient;
pub mod recommendations;
mod types;
pub mod units;

pub use alerts::{build_forecast_result, build_forecast_result_from, evaluate_alerts, ALERT_RULES};
pub use clusters::{assign_cluster, cluster_info, ClusterFeatures, ClusterInfo, ClusterPrediction, CLUSTERS};
pub use error::{AnalyticsError, AnalyticsResult};
pub use forecast::{forecast, CareAction, ForecastRequest, HistoricalRecord};
pub use metrics::{compute_daily_metrics, compute_for_day};
pub use patient::{AnalysisTrend, PatientAnalysis, PatientAnalyzer};
pub use recommendations::{generate_recommendations, Recommendation, RecommendationLevel};
pub use types::*;
pub use units::{normalize_glucose, GlucoseUnit};
