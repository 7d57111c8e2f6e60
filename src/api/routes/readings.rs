//! Reading Routes
//!
//! Glucose values may be sent in mg/dL or mmol/L; they are stored in
//! mg/dL.
//!
//! - POST /api/v1/patients/:id/readings - Add one reading
//! - POST /api/v1/patients/:id/readings/bulk - Add many readings
//! - GET /api/v1/patients/:id/readings?limit= - Recent readings, newest first
//! - DELETE /api/v1/patients/:id/readings - Delete all of a patient's readings

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::analytics::{normalize_glucose, GlucoseReading};
use crate::api::dto::{
    parse_unit, BulkReadingsRequest, DeletedResponse, InsertedResponse, ReadingListResponse,
    ReadingRequest, ReadingsQuery,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ValidJson;
use crate::api::state::AppState;

/// Upper bound for one bulk upload
const MAX_BULK_READINGS: usize = 10_000;

/// Upper bound for the list endpoint
const MAX_LIST_LIMIT: usize = 5_000;

/// POST /api/v1/patients/:id/readings
pub async fn add_reading(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
    ValidJson(req): ValidJson<ReadingRequest>,
) -> ApiResult<(StatusCode, Json<GlucoseReading>)> {
    let unit = parse_unit(req.unit.as_deref())?;
    let value = normalize_glucose(req.value, unit)?;
    let reading = GlucoseReading::new(
        patient_id.as_str(),
        req.timestamp.unwrap_or_else(Utc::now),
        value,
    );

    state.store.insert_reading(&reading)?;

    tracing::debug!(patient_id = %patient_id, value = value, "Reading stored");

    Ok((StatusCode::CREATED, Json(reading)))
}

/// POST /api/v1/patients/:id/readings/bulk
///
/// All or nothing: one invalid value rejects the batch.
pub async fn add_readings_bulk(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
    ValidJson(req): ValidJson<BulkReadingsRequest>,
) -> ApiResult<(StatusCode, Json<InsertedResponse>)> {
    if req.readings.is_empty() {
        return Err(ApiError::Validation("no readings supplied".to_string()));
    }
    if req.readings.len() > MAX_BULK_READINGS {
        return Err(ApiError::Validation(format!(
            "at most {} readings per request, got {}",
            MAX_BULK_READINGS,
            req.readings.len()
        )));
    }

    let unit = parse_unit(req.unit.as_deref())?;
    let readings = req
        .readings
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            normalize_glucose(entry.value, unit)
                .map(|value| GlucoseReading::new(patient_id.as_str(), entry.timestamp, value))
                .map_err(|e| ApiError::Validation(format!("reading {}: {}", idx, e)))
        })
        .collect::<ApiResult<Vec<_>>>()?;

    let inserted = state.store.insert_readings(&patient_id, &readings)?;

    tracing::info!(patient_id = %patient_id, count = inserted, "Bulk readings stored");

    Ok((
        StatusCode::CREATED,
        Json(InsertedResponse {
            status: "ok".to_string(),
            inserted,
        }),
    ))
}

/// GET /api/v1/patients/:id/readings
pub async fn list_readings(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
    Query(params): Query<ReadingsQuery>,
) -> ApiResult<Json<ReadingListResponse>> {
    let limit = params
        .limit
        .unwrap_or(state.config.default_reading_limit)
        .clamp(1, MAX_LIST_LIMIT);

    state.store.require_patient(&patient_id)?;
    let readings = state.store.recent_readings(&patient_id, limit)?;

    Ok(Json(ReadingListResponse {
        patient_id,
        total: readings.len(),
        readings,
    }))
}

/// DELETE /api/v1/patients/:id/readings
pub async fn delete_readings(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<DeletedResponse>> {
    state.store.require_patient(&patient_id)?;
    let deleted = state.store.delete_readings(&patient_id)?;

    tracing::info!(patient_id = %patient_id, deleted = deleted, "Readings deleted");

    Ok(Json(DeletedResponse {
        status: "ok".to_string(),
        deleted,
    }))
}
