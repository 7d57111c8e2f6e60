//! Forecast Routes
//!
//! - POST /api/v1/forecast - Run the forecaster and post-process its output
//! - POST /api/v1/alerts/evaluate - Post-process predictions from elsewhere

use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::analytics::alerts::STEP_MINUTES;
use crate::analytics::forecast::MAX_STEPS;
use crate::analytics::{
    build_forecast_result, build_forecast_result_from, forecast, ForecastRequest, ForecastResult,
};
use crate::api::dto::{parse_unit, EvaluateAlertsRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ValidJson;
use crate::api::state::AppState;

/// POST /api/v1/forecast
pub async fn run_forecast(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<ForecastRequest>,
) -> ApiResult<Json<ForecastResult>> {
    let forecaster = state
        .forecaster
        .as_ref()
        .ok_or_else(|| ApiError::ModelUnavailable("no forecaster configured".to_string()))?;

    let result = forecast(forecaster.as_ref(), &req).await?;
    Ok(Json(result))
}

/// POST /api/v1/alerts/evaluate
pub async fn evaluate_alerts(
    ValidJson(req): ValidJson<EvaluateAlertsRequest>,
) -> ApiResult<Json<ForecastResult>> {
    if req.predictions.len() > MAX_STEPS {
        return Err(ApiError::Validation(format!(
            "at most {} predictions, got {}",
            MAX_STEPS,
            req.predictions.len()
        )));
    }

    let unit = parse_unit(req.unit.as_deref())?;
    let predictions: Vec<f64> = req.predictions.iter().map(|v| unit.to_mg_dl(*v)).collect();

    let timestamps = req.timestamps.unwrap_or_else(|| {
        let now = Utc::now();
        (1..=predictions.len())
            .map(|step| now + Duration::minutes(STEP_MINUTES * step as i64))
            .collect()
    });

    let result = match req.current {
        Some(current) => build_forecast_result_from(unit.to_mg_dl(current), predictions, timestamps)?,
        None => build_forecast_result(predictions, timestamps)?,
    };

    Ok(Json(result))
}
