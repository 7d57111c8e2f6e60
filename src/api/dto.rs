//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::{ClusterInfo, DailyMetrics, GlucoseReading, GlucoseUnit};
use crate::api::error::{ApiError, ApiResult};
use crate::store::{CarbSelection, ClusterAssignment, Food, Patient};

/// Parse an optional unit label, defaulting to mg/dL
pub fn parse_unit(unit: Option<&str>) -> ApiResult<GlucoseUnit> {
    match unit {
        None => Ok(GlucoseUnit::MgDl),
        Some(s) => GlucoseUnit::parse(s)
            .ok_or_else(|| ApiError::Validation(format!("unknown glucose unit: {}", s))),
    }
}

// ============================================
// PATIENT DTOs
// ============================================

/// Patient list response
#[derive(Debug, Serialize, Deserialize)]
pub struct PatientListResponse {
    pub total: usize,
    pub patients: Vec<Patient>,
}

/// Response for deletions
#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub status: String,
    /// Rows removed
    pub deleted: usize,
}

// ============================================
// READING DTOs
// ============================================

/// Single reading request
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadingRequest {
    /// Defaults to now
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub value: f64,
    /// "mg/dL" (default) or "mmol/L"
    #[serde(default)]
    pub unit: Option<String>,
}

/// One entry of a bulk upload
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadingEntry {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Bulk reading upload; one unit for the whole batch
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkReadingsRequest {
    pub readings: Vec<ReadingEntry>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Reading insert response
#[derive(Debug, Serialize, Deserialize)]
pub struct InsertedResponse {
    pub status: String,
    pub inserted: usize,
}

/// Query parameters for listing readings
#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    pub limit: Option<usize>,
}

/// Reading list, newest first, values in mg/dL
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadingListResponse {
    pub patient_id: String,
    pub total: usize,
    pub readings: Vec<GlucoseReading>,
}

// ============================================
// METRICS & ANALYSIS DTOs
// ============================================

/// Query parameters for the daily metrics endpoint
#[derive(Debug, Deserialize)]
pub struct DateQuery {
    /// Defaults to today (UTC)
    pub date: Option<NaiveDate>,
    /// Recompute even when a stored row exists
    #[serde(default)]
    pub refresh: bool,
}

/// Daily metrics response
#[derive(Debug, Serialize, Deserialize)]
pub struct DailyMetricsResponse {
    /// "stored" or "computed"
    pub source: String,
    pub metrics: DailyMetrics,
}

/// Query parameters for windowed endpoints
#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<u32>,
}

/// Stored metrics and cluster history for a patient
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub patient_id: String,
    pub days: u32,
    pub metrics: Vec<DailyMetrics>,
    pub cluster_history: Vec<ClusterAssignment>,
}

/// Cluster catalog response
#[derive(Debug, Serialize)]
pub struct ClusterListResponse {
    pub total: usize,
    pub clusters: Vec<&'static ClusterInfo>,
}

// ============================================
// ALERT DTOs
// ============================================

/// Raw predictions to post-process
#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluateAlertsRequest {
    pub predictions: Vec<f64>,
    /// One per prediction; defaults to 5-minute steps from now
    #[serde(default)]
    pub timestamps: Option<Vec<DateTime<Utc>>>,
    /// Current glucose; defaults to the first prediction
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

// ============================================
// CHAT DTOs
// ============================================

/// Chat message request
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Conversation reset response
#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub conversation_id: String,
    /// False when the conversation did not exist
    pub reset: bool,
}

// ============================================
// FOOD DTOs
// ============================================

/// Food category list
#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub total: usize,
    pub categories: Vec<&'static str>,
}

/// Food search parameters
#[derive(Debug, Deserialize)]
pub struct FoodSearchQuery {
    pub q: String,
    pub category: Option<String>,
}

/// Food list response
#[derive(Debug, Serialize, Deserialize)]
pub struct FoodListResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub total: usize,
    pub foods: Vec<Food>,
}

/// Carbohydrate calculator request
#[derive(Debug, Serialize, Deserialize)]
pub struct CarbRequest {
    pub items: Vec<CarbSelection>,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded" or "unhealthy"
    pub status: String,
    /// Store status: "ok" or "error"
    pub store: String,
    /// "configured" or "not_configured"
    pub forecaster: String,
    /// Classifier in use
    pub classifier: String,
    /// "enabled" or "disabled"
    pub chat: String,
    /// "running", "idle" or "disabled"
    pub scheduler: String,
    pub uptime_seconds: u64,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit() {
        assert_eq!(parse_unit(None).unwrap(), GlucoseUnit::MgDl);
        assert_eq!(parse_unit(Some("mmol/L")).unwrap(), GlucoseUnit::MmolL);
        assert!(matches!(parse_unit(Some("stones")), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_reading_request_defaults() {
        let req: ReadingRequest = serde_json::from_str(r#"{"value": 120}"#).unwrap();
        assert!(req.timestamp.is_none());
        assert!(req.unit.is_none());
        assert_eq!(req.value, 120.0);
    }

    #[test]
    fn test_carb_request_default_servings() {
        let req: CarbRequest =
            serde_json::from_str(r#"{"items": [{"category": "frutas", "id": 2}]}"#).unwrap();
        assert_eq!(req.items[0].servings, 1.0);
    }
}
