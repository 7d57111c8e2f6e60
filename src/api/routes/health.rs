//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (ready to serve traffic)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Kubernetes readiness probe.
/// Returns 200 once the database answers.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match check_store_health(&state) {
        true => StatusCode::OK,
        false => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health
///
/// Full health status with component details. Optional components
/// (forecaster, chat) do not make the service unhealthy.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store_ok = check_store_health(&state);

    let overall_status = if !store_ok {
        "unhealthy"
    } else if state.forecaster.is_none() {
        "degraded"
    } else {
        "healthy"
    };

    let scheduler = match &state.scheduler {
        Some(scheduler) => {
            let status = scheduler.status().await;
            match (status.enabled, status.running) {
                (false, _) => "disabled",
                (true, true) => "running",
                (true, false) => "idle",
            }
        }
        None => "disabled",
    };

    Json(HealthResponse {
        status: overall_status.to_string(),
        store: if store_ok { "ok" } else { "error" }.to_string(),
        forecaster: if state.forecaster.is_some() {
            "configured"
        } else {
            "not_configured"
        }
        .to_string(),
        classifier: state.analyzer.classifier_name().to_string(),
        chat: if state.chat.is_some() { "enabled" } else { "disabled" }.to_string(),
        scheduler: scheduler.to_string(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn check_store_health(state: &AppState) -> bool {
    match state.store.ping() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
