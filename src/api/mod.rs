//! glycotrack REST API
//!
//! HTTP API layer, built with Axum. Glucose values are accepted in mg/dL
//! or mmol/L and always returned in mg/dL.
//!
//! # Endpoints
//!
//! ## Patients & readings
//! - `POST /api/v1/patients` - Register a patient
//! - `GET /api/v1/patients` - List patients
//! - `GET /api/v1/patients/:id` - Get a patient
//! - `DELETE /api/v1/patients/:id` - Delete a patient
//! - `POST /api/v1/patients/:id/readings` - Add a reading
//! - `POST /api/v1/patients/:id/readings/bulk` - Add many readings
//! - `GET /api/v1/patients/:id/readings` - Recent readings
//! - `DELETE /api/v1/patients/:id/readings` - Delete readings
//!
//! ## Analytics
//! - `GET /api/v1/patients/:id/metrics/daily` - Daily metrics
//! - `GET /api/v1/patients/:id/analysis` - Cluster, trend, recommendations
//! - `GET /api/v1/patients/:id/history` - Metrics and cluster history
//! - `GET /api/v1/clusters` - Cluster catalog
//! - `POST /api/v1/forecast` - Glucose forecast with alerts
//! - `POST /api/v1/alerts/evaluate` - Alerts for supplied predictions
//!
//! ## Chat
//! - `POST /api/v1/chat` - Send a message
//! - `DELETE /api/v1/chat/:conversation_id` - Reset a conversation
//! - `GET /api/v1/chat/health` - Chat status
//!
//! ## Foods
//! - `GET /api/v1/foods/categories`, `/foods/stats`, `/foods/search`
//! - `GET /api/v1/foods/:category`, `/foods/:category/:id`
//! - `POST /api/v1/foods/carbs` - Carbohydrate calculator
//!
//! ## Scheduler
//! - `GET /api/v1/scheduler/status`
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use glycotrack::api::{serve, ApiConfig, AppState};
//! use glycotrack::models::RuleClassifier;
//! use glycotrack::store::SqliteStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteStore::open("glycotrack.db".as_ref())?);
//!     let config = ApiConfig::default();
//!
//!     let state = AppState::new(store, Arc::new(RuleClassifier), config.clone());
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use extract::ValidJson;
pub use state::{ApiConfig, AppState};

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let max_body_size = state.config.max_body_size;
    let cors = cors_layer(&state.config.cors_origins);
    let timeout = TimeoutLayer::new(state.config.request_timeout());

    let api_routes = Router::new()
        // Patient routes
        .route(
            "/patients",
            post(routes::patients::create_patient).get(routes::patients::list_patients),
        )
        .route(
            "/patients/:id",
            get(routes::patients::get_patient).delete(routes::patients::delete_patient),
        )
        // Reading routes
        .route(
            "/patients/:id/readings",
            post(routes::readings::add_reading)
                .get(routes::readings::list_readings)
                .delete(routes::readings::delete_readings),
        )
        .route(
            "/patients/:id/readings/bulk",
            post(routes::readings::add_readings_bulk),
        )
        // Metrics and analysis routes
        .route(
            "/patients/:id/metrics/daily",
            get(routes::analysis::daily_metrics),
        )
        .route("/patients/:id/analysis", get(routes::analysis::analyze_patient))
        .route("/patients/:id/history", get(routes::analysis::patient_history))
        .route("/clusters", get(routes::analysis::list_clusters))
        // Forecast routes
        .route("/forecast", post(routes::forecast::run_forecast))
        .route("/alerts/evaluate", post(routes::forecast::evaluate_alerts))
        // Chat routes
        .route("/chat", post(routes::chat::send_message))
        .route("/chat/health", get(routes::chat::chat_health))
        .route(
            "/chat/:conversation_id",
            axum::routing::delete(routes::chat::reset_conversation),
        )
        // Food routes
        .route("/foods/categories", get(routes::foods::list_categories))
        .route("/foods/stats", get(routes::foods::food_stats))
        .route("/foods/search", get(routes::foods::search_foods))
        .route("/foods/carbs", post(routes::foods::carbohydrate_total))
        .route("/foods/:category", get(routes::foods::foods_by_category))
        .route("/foods/:category/:id", get(routes::foods::get_food))
        // Scheduler routes
        .route("/scheduler/status", get(routes::scheduler::scheduler_status))
        .layer(DefaultBodyLimit::max(max_body_size));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// CORS for the configured origins; any origin when none (or `*`) is given
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o.trim() == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("glycotrack API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("glycotrack API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
