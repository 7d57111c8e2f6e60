//! Patient behavior clusters
//!
//! Five fixed clusters describe typical glycemic control patterns. An
//! injected [`Classifier`] maps a feature vector to one of them; the
//! metadata for each id is a static table.

use serde::{Deserialize, Serialize};

use super::error::{AnalyticsError, AnalyticsResult};
use super::types::DailyMetrics;
use crate::models::Classifier;

/// Averaged metrics used as classifier input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterFeatures {
    pub avg_mean_glucose: f64,
    pub avg_cv: f64,
    pub avg_tir: f64,
    pub avg_tbr: f64,
    pub avg_tar: f64,
    pub avg_gmi: f64,
}

impl ClusterFeatures {
    /// Average a set of daily metrics
    pub fn from_daily(days: &[DailyMetrics]) -> AnalyticsResult<Self> {
        if days.is_empty() {
            return Err(AnalyticsError::Computation(
                "cannot average an empty set of daily metrics".to_string(),
            ));
        }

        let n = days.len() as f64;
        let avg = |f: fn(&DailyMetrics) -> f64| days.iter().map(f).sum::<f64>() / n;

        let features = Self {
            avg_mean_glucose: avg(|d| d.mean),
            avg_cv: avg(|d| d.cv),
            avg_tir: avg(|d| d.time_in_range),
            avg_tbr: avg(|d| d.time_below_range),
            avg_tar: avg(|d| d.time_above_range),
            avg_gmi: avg(|d| d.gmi),
        };

        if features.to_vector().iter().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::Computation(
                "averaged metrics are not finite".to_string(),
            ));
        }

        Ok(features)
    }

    /// Feature vector in model order
    pub fn to_vector(&self) -> [f64; 6] {
        [
            self.avg_mean_glucose,
            self.avg_cv,
            self.avg_tir,
            self.avg_tbr,
            self.avg_tar,
            self.avg_gmi,
        ]
    }
}

/// Static description of a cluster
#[derive(Debug, Clone, Serialize)]
pub struct ClusterInfo {
    pub id: u8,
    pub name: &'static str,
    pub description: &'static str,
    /// Defining threshold range, e.g. "tir > 70 and cv < 36"
    pub threshold_range: &'static str,
    pub typical_tir: &'static str,
    pub typical_cv: &'static str,
    pub typical_tbr: &'static str,
    pub risk_level: &'static str,
}

pub static CLUSTERS: [ClusterInfo; 5] = [
    ClusterInfo {
        id: 0,
        name: "Excellent Control",
        description: "Glucose mostly in target with low variability and little time below range.",
        threshold_range: "tir > 70 and cv < 36",
        typical_tir: ">70%",
        typical_cv: "<36%",
        typical_tbr: "<4%",
        risk_level: "low",
    },
    ClusterInfo {
        id: 1,
        name: "Moderate Control",
        description: "Reasonable control with room to increase time in range.",
        threshold_range: "tir 50-70",
        typical_tir: "50-70%",
        typical_cv: "36-40%",
        typical_tbr: "<4%",
        risk_level: "moderate",
    },
    ClusterInfo {
        id: 2,
        name: "High Variability",
        description: "Large glucose swings through the day; stability is the main goal.",
        threshold_range: "cv > 40",
        typical_tir: "40-60%",
        typical_cv: ">40%",
        typical_tbr: "variable",
        risk_level: "high",
    },
    ClusterInfo {
        id: 3,
        name: "Hypoglycemia Risk",
        description: "Frequent time below range; low episodes need attention first.",
        threshold_range: "tbr > 4",
        typical_tir: "variable",
        typical_cv: "variable",
        typical_tbr: ">4%",
        risk_level: "high",
    },
    ClusterInfo {
        id: 4,
        name: "Suboptimal Control",
        description: "Most time spent out of target, usually above range.",
        threshold_range: "tir < 50",
        typical_tir: "<50%",
        typical_cv: "variable",
        typical_tbr: "variable",
        risk_level: "high",
    },
];

/// Metadata for a cluster id
pub fn cluster_info(id: u8) -> Option<&'static ClusterInfo> {
    CLUSTERS.iter().find(|c| c.id == id)
}

/// Classifier output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterPrediction {
    pub cluster_id: u8,
    /// 0-1
    pub confidence: f64,
}

/// A classified feature vector with its cluster metadata
#[derive(Debug, Clone, Serialize)]
pub struct ClusterAssignmentResult {
    pub cluster_id: u8,
    pub confidence: f64,
    pub info: &'static ClusterInfo,
}

/// Classify a feature vector and attach the cluster's metadata
pub async fn assign_cluster(
    classifier: &dyn Classifier,
    features: &ClusterFeatures,
) -> AnalyticsResult<ClusterAssignmentResult> {
    let prediction = classifier.classify(features).await?;

    let info = cluster_info(prediction.cluster_id).ok_or_else(|| {
        AnalyticsError::Computation(format!(
            "classifier {} returned unknown cluster {}",
            classifier.name(),
            prediction.cluster_id
        ))
    })?;

    if !(0.0..=1.0).contains(&prediction.confidence) {
        return Err(AnalyticsError::Computation(format!(
            "classifier {} returned confidence {} outside 0-1",
            classifier.name(),
            prediction.confidence
        )));
    }

    Ok(ClusterAssignmentResult {
        cluster_id: prediction.cluster_id,
        confidence: prediction.confidence,
        info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::testing::FixedClassifier;
    use crate::models::RuleClassifier;

    fn features(tir: f64, cv: f64, tbr: f64) -> ClusterFeatures {
        ClusterFeatures {
            avg_mean_glucose: 140.0,
            avg_cv: cv,
            avg_tir: tir,
            avg_tbr: tbr,
            avg_tar: 100.0 - tir - tbr,
            avg_gmi: 6.6,
        }
    }

    #[test]
    fn test_catalog() {
        assert_eq!(CLUSTERS.len(), 5);
        for (i, c) in CLUSTERS.iter().enumerate() {
            assert_eq!(c.id as usize, i);
        }
        assert_eq!(cluster_info(0).unwrap().name, "Excellent Control");
        assert_eq!(cluster_info(3).unwrap().name, "Hypoglycemia Risk");
        assert!(cluster_info(5).is_none());
    }

    #[tokio::test]
    async fn test_assign_with_rules() {
        let result = assign_cluster(&RuleClassifier, &features(80.0, 30.0, 2.0))
            .await
            .unwrap();
        assert_eq!(result.cluster_id, 0);
        assert_eq!(result.info.name, "Excellent Control");
        assert_eq!(result.confidence, 0.85);
    }

    #[tokio::test]
    async fn test_unknown_cluster_rejected() {
        let classifier = FixedClassifier::new(9, 0.9);
        let err = assign_cluster(&classifier, &features(80.0, 30.0, 2.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Computation(_)));
    }

    #[test]
    fn test_features_from_daily() {
        let day = |tir: f64| DailyMetrics {
            patient_id: "P001".into(),
            date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            mean: 150.0,
            std: 30.0,
            cv: 20.0,
            time_in_range: tir,
            time_below_range: 2.0,
            time_below_range_severe: 0.0,
            time_above_range: 100.0 - tir - 2.0,
            time_above_range_severe: 0.0,
            gmi: 6.9,
            range: 120.0,
            median: 150.0,
            min: 90.0,
            max: 210.0,
            reading_count: 288,
        };

        let f = ClusterFeatures::from_daily(&[day(60.0), day(80.0)]).unwrap();
        assert_eq!(f.avg_tir, 70.0);
        assert_eq!(f.avg_mean_glucose, 150.0);
        assert_eq!(f.avg_tbr, 2.0);

        assert!(ClusterFeatures::from_daily(&[]).is_err());
    }
}
