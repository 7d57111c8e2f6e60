//! Metrics and Analysis Routes
//!
//! - GET /api/v1/patients/:id/metrics/daily?date=&refresh= - Daily metrics
//! - GET /api/v1/patients/:id/analysis?days= - Cluster, trend and recommendations
//! - GET /api/v1/patients/:id/history?days= - Stored metrics and cluster history
//! - GET /api/v1/clusters - Cluster catalog

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::analytics::{compute_for_day, PatientAnalysis, CLUSTERS};
use crate::api::dto::{
    ClusterListResponse, DailyMetricsResponse, DateQuery, DaysQuery, HistoryResponse,
};
use crate::api::error::ApiResult;
use crate::api::state::AppState;

const DEFAULT_WINDOW_DAYS: u32 = 30;

/// GET /api/v1/patients/:id/metrics/daily
///
/// Returns the stored row when there is one, otherwise computes the day
/// from its readings and persists it.
pub async fn daily_metrics(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
    Query(params): Query<DateQuery>,
) -> ApiResult<Json<DailyMetricsResponse>> {
    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());
    state.store.require_patient(&patient_id)?;

    if !params.refresh {
        if let Some(metrics) = state.store.get_daily_metrics(&patient_id, date)? {
            return Ok(Json(DailyMetricsResponse {
                source: "stored".to_string(),
                metrics,
            }));
        }
    }

    let metrics = compute_for_day(state.store.as_ref(), &patient_id, date)?;

    Ok(Json(DailyMetricsResponse {
        source: "computed".to_string(),
        metrics,
    }))
}

/// GET /api/v1/patients/:id/analysis
pub async fn analyze_patient(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
    Query(params): Query<DaysQuery>,
) -> ApiResult<Json<PatientAnalysis>> {
    let days = params.days.unwrap_or(DEFAULT_WINDOW_DAYS);
    let analysis = state
        .analyzer
        .analyze(&patient_id, days, Utc::now().date_naive())
        .await?;
    Ok(Json(analysis))
}

/// GET /api/v1/patients/:id/history
pub async fn patient_history(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
    Query(params): Query<DaysQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let days = params.days.unwrap_or(DEFAULT_WINDOW_DAYS);
    let metrics = state
        .analyzer
        .history(&patient_id, days, Utc::now().date_naive())?;
    let cluster_history = state.store.cluster_assignments(&patient_id)?;

    Ok(Json(HistoryResponse {
        patient_id,
        days,
        metrics,
        cluster_history,
    }))
}

/// GET /api/v1/clusters
pub async fn list_clusters() -> Json<ClusterListResponse> {
    Json(ClusterListResponse {
        total: CLUSTERS.len(),
        clusters: CLUSTERS.iter().collect(),
    })
}
