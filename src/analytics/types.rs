//! Core analytics types
//!
//! Readings, daily metrics, forecast alerts and summaries. All glucose
//! values are mg/dL.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single timestamped glucose measurement for one patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucoseReading {
    pub patient_id: String,
    pub timestamp: DateTime<Utc>,
    /// mg/dL
    pub value: f64,
}

impl GlucoseReading {
    pub fn new(patient_id: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            patient_id: patient_id.into(),
            timestamp,
            value,
        }
    }
}

/// Glycemic control metrics for one patient-day
///
/// Percentages are 0-100. `reading_count` is always at least
/// [`MIN_READINGS_PER_DAY`](crate::analytics::metrics::MIN_READINGS_PER_DAY).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub patient_id: String,
    pub date: NaiveDate,
    pub mean: f64,
    pub std: f64,
    pub cv: f64,
    pub time_in_range: f64,
    pub time_below_range: f64,
    pub time_below_range_severe: f64,
    pub time_above_range: f64,
    pub time_above_range_severe: f64,
    /// Glucose Management Indicator, an HbA1c estimate in %
    pub gmi: f64,
    pub range: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub reading_count: usize,
}

/// Kind of glucose excursion an alert reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertCategory {
    HypoglycemiaCritical,
    Hypoglycemia,
    Hyperglycemia,
    HyperglycemiaCritical,
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertCategory::HypoglycemiaCritical => "HYPOGLYCEMIA_CRITICAL",
            AlertCategory::Hypoglycemia => "HYPOGLYCEMIA",
            AlertCategory::Hyperglycemia => "HYPERGLYCEMIA",
            AlertCategory::HyperglycemiaCritical => "HYPERGLYCEMIA_CRITICAL",
        };
        write!(f, "{}", s)
    }
}

/// Alert severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Critical,
}

/// A threshold violation at one forecast step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Time from the last reading, e.g. "+15 min"
    pub offset_label: String,
    pub category: AlertCategory,
    pub severity: Severity,
    pub glucose_value: f64,
    pub message: String,
}

/// Direction of a forecast window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Ascending,
    Descending,
}

/// Overall risk of a forecast window
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

/// Summary statistics for a forecast window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub current: f64,
    #[serde(rename = "final")]
    pub final_value: f64,
    pub delta: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub trend: Trend,
    pub time_in_range: f64,
    pub risk_level: RiskLevel,
}

/// Post-processed output of one forecast request. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub predictions: Vec<f64>,
    pub timestamps: Vec<DateTime<Utc>>,
    pub alerts: Vec<Alert>,
    pub summary: SummaryRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_serialization() {
        let alert = Alert {
            offset_label: "+15 min".to_string(),
            category: AlertCategory::HypoglycemiaCritical,
            severity: Severity::Critical,
            glucose_value: 65.0,
            message: "low".to_string(),
        };

        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["category"], "HYPOGLYCEMIA_CRITICAL");
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["offset_label"], "+15 min");
    }

    #[test]
    fn test_summary_final_field_name() {
        let summary = SummaryRecord {
            current: 120.0,
            final_value: 130.0,
            delta: 10.0,
            min: 120.0,
            max: 130.0,
            mean: 125.0,
            trend: Trend::Ascending,
            time_in_range: 100.0,
            risk_level: RiskLevel::Low,
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["final"], 130.0);
        assert_eq!(json["trend"], "ascending");
        assert_eq!(json["risk_level"], "low");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(RiskLevel::High > RiskLevel::Moderate);
        assert!(RiskLevel::Moderate > RiskLevel::Low);
    }
}
