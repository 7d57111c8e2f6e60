//! Patient analyzer
//!
//! Aggregates a window of stored daily metrics into a cluster feature
//! vector, classifies it, records the assignment and derives the TIR
//! trend, a 0-100 risk score and recommendations.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::clusters::{assign_cluster, ClusterFeatures, ClusterInfo};
use super::error::{AnalyticsError, AnalyticsResult};
use super::recommendations::{generate_recommendations, Recommendation};
use super::types::DailyMetrics;
use crate::models::Classifier;
use crate::store::{ClusterAssignment, SqliteStore};

/// Fewest metric days an analysis accepts
pub const MIN_ANALYSIS_DAYS: usize = 7;

pub const ANALYSIS_WINDOW_DAYS: std::ops::RangeInclusive<u32> = 7..=30;
pub const HISTORY_WINDOW_DAYS: std::ops::RangeInclusive<u32> = 1..=90;

/// TIR change, in percentage points, needed to call a trend
const TREND_MARGIN: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisTrend {
    Improving,
    Worsening,
    Stable,
}

/// Compare mean TIR of the first three rows with the last three
pub fn tir_trend(rows: &[DailyMetrics]) -> AnalysisTrend {
    if rows.len() < 6 {
        return AnalysisTrend::Stable;
    }

    let mean_tir = |rows: &[DailyMetrics]| {
        rows.iter().map(|m| m.time_in_range).sum::<f64>() / rows.len() as f64
    };
    let early = mean_tir(&rows[..3]);
    let recent = mean_tir(&rows[rows.len() - 3..]);

    if recent > early + TREND_MARGIN {
        AnalysisTrend::Improving
    } else if recent < early - TREND_MARGIN {
        AnalysisTrend::Worsening
    } else {
        AnalysisTrend::Stable
    }
}

/// Additive risk score from one day's metrics, capped at 100
pub fn risk_score(m: &DailyMetrics) -> f64 {
    let mut risk = 0.0;

    if m.time_in_range < 50.0 {
        risk += 30.0;
    } else if m.time_in_range < 70.0 {
        risk += 15.0;
    }

    if m.cv > 40.0 {
        risk += 25.0;
    } else if m.cv > 36.0 {
        risk += 15.0;
    }

    if m.time_below_range_severe > 1.0 {
        risk += 30.0;
    } else if m.time_below_range_severe > 0.0 {
        risk += 15.0;
    }

    if m.time_below_range > 4.0 {
        risk += 15.0;
    }
    if m.time_above_range > 25.0 {
        risk += 10.0;
    }

    f64::min(risk, 100.0)
}

/// Cluster section of an analysis
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub cluster_id: u8,
    pub cluster_name: &'static str,
    pub confidence_score: f64,
    pub info: &'static ClusterInfo,
    /// Averaged features the classifier saw
    pub metrics: ClusterFeatures,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientAnalysis {
    pub patient_id: String,
    pub analysis_date: chrono::DateTime<Utc>,
    pub days_analyzed: usize,
    pub cluster: ClusterSummary,
    pub current_metrics: DailyMetrics,
    pub recommendations: Vec<Recommendation>,
    pub trend: AnalysisTrend,
    pub risk_score: f64,
}

/// Runs patient analyses against the store with an injected classifier
pub struct PatientAnalyzer {
    store: Arc<SqliteStore>,
    classifier: Arc<dyn Classifier>,
}

impl PatientAnalyzer {
    pub fn new(store: Arc<SqliteStore>, classifier: Arc<dyn Classifier>) -> Self {
        Self { store, classifier }
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Analyze the `days` days ending on `today`, inclusive
    pub async fn analyze(
        &self,
        patient_id: &str,
        days: u32,
        today: NaiveDate,
    ) -> AnalyticsResult<PatientAnalysis> {
        if !ANALYSIS_WINDOW_DAYS.contains(&days) {
            return Err(AnalyticsError::Validation(format!(
                "days must be between {} and {}, got {}",
                ANALYSIS_WINDOW_DAYS.start(),
                ANALYSIS_WINDOW_DAYS.end(),
                days
            )));
        }

        self.store.require_patient(patient_id)?;

        let rows = self.window(patient_id, days, today)?;
        if rows.len() < MIN_ANALYSIS_DAYS {
            return Err(AnalyticsError::days(rows.len(), MIN_ANALYSIS_DAYS));
        }

        let features = ClusterFeatures::from_daily(&rows)?;
        let assignment = assign_cluster(self.classifier.as_ref(), &features).await?;

        let assigned_at = Utc::now();
        self.store.record_cluster_assignment(&ClusterAssignment {
            patient_id: patient_id.to_string(),
            cluster_id: assignment.cluster_id,
            cluster_name: assignment.info.name.to_string(),
            confidence_score: assignment.confidence,
            assigned_at,
            avg_tir: features.avg_tir,
            avg_cv: features.avg_cv,
            avg_gmi: features.avg_gmi,
        })?;

        let trend = tir_trend(&rows);
        // Non-empty: checked against MIN_ANALYSIS_DAYS above
        let latest = rows[rows.len() - 1].clone();
        let recommendations = generate_recommendations(assignment.cluster_id, &latest, trend);
        let risk = risk_score(&latest);

        tracing::info!(
            patient_id = %patient_id,
            days = rows.len(),
            cluster = assignment.cluster_id,
            classifier = self.classifier.name(),
            risk_score = risk,
            "Patient analyzed"
        );

        Ok(PatientAnalysis {
            patient_id: patient_id.to_string(),
            analysis_date: assigned_at,
            days_analyzed: rows.len(),
            cluster: ClusterSummary {
                cluster_id: assignment.cluster_id,
                cluster_name: assignment.info.name,
                confidence_score: assignment.confidence,
                info: assignment.info,
                metrics: features,
            },
            current_metrics: latest,
            recommendations,
            trend,
            risk_score: risk,
        })
    }

    /// Stored metrics for the `days` days ending on `today`, oldest first
    pub fn history(
        &self,
        patient_id: &str,
        days: u32,
        today: NaiveDate,
    ) -> AnalyticsResult<Vec<DailyMetrics>> {
        if !HISTORY_WINDOW_DAYS.contains(&days) {
            return Err(AnalyticsError::Validation(format!(
                "days must be between {} and {}, got {}",
                HISTORY_WINDOW_DAYS.start(),
                HISTORY_WINDOW_DAYS.end(),
                days
            )));
        }

        self.store.require_patient(patient_id)?;
        self.window(patient_id, days, today)
    }

    fn window(&self, patient_id: &str, days: u32, today: NaiveDate) -> AnalyticsResult<Vec<DailyMetrics>> {
        let start = today - chrono::Duration::days(i64::from(days) - 1);
        Ok(self.store.daily_metrics_range(patient_id, start, today)?)
    }
}
