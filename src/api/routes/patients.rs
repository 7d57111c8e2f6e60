//! Patient Routes
//!
//! - POST /api/v1/patients - Register a patient
//! - GET /api/v1/patients - List patients
//! - GET /api/v1/patients/:id - Get a patient
//! - DELETE /api/v1/patients/:id - Delete a patient and all their data

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{DeletedResponse, PatientListResponse};
use crate::api::error::ApiResult;
use crate::api::extract::ValidJson;
use crate::api::state::AppState;
use crate::store::{NewPatient, Patient};

/// POST /api/v1/patients
pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<NewPatient>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    req.validate()?;
    let patient = state.store.create_patient(&req)?;

    tracing::info!(patient_id = %patient.id, "Created patient");

    Ok((StatusCode::CREATED, Json(patient)))
}

/// GET /api/v1/patients
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<PatientListResponse>> {
    let patients = state.store.list_patients()?;
    Ok(Json(PatientListResponse {
        total: patients.len(),
        patients,
    }))
}

/// GET /api/v1/patients/:id
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Patient>> {
    Ok(Json(state.store.require_patient(&id)?))
}

/// DELETE /api/v1/patients/:id
///
/// Readings, metrics and cluster history go with the patient.
pub async fn delete_patient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeletedResponse>> {
    state.store.delete_patient(&id)?;

    tracing::info!(patient_id = %id, "Deleted patient");

    Ok(Json(DeletedResponse {
        status: "ok".to_string(),
        deleted: 1,
    }))
}
