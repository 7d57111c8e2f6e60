//! Recommendation generator
//!
//! Canned guidance assembled from four rule groups: thresholds on the
//! latest day's metrics, static text per cluster, the TIR trend, and an
//! "excellent control" note. The result is sorted by priority, 1 first.

use serde::{Deserialize, Serialize};

use super::patient::AnalysisTrend;
use super::types::DailyMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationLevel {
    Critical,
    High,
    Moderate,
    Low,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub level: RecommendationLevel,
    pub category: String,
    pub title: String,
    pub description: String,
    /// 1 is most urgent
    pub priority: u8,
}

impl Recommendation {
    fn new(
        level: RecommendationLevel,
        category: &str,
        title: &str,
        description: impl Into<String>,
        priority: u8,
    ) -> Self {
        Self {
            level,
            category: category.to_string(),
            title: title.to_string(),
            description: description.into(),
            priority,
        }
    }
}

use RecommendationLevel::*;

fn metric_rules(m: &DailyMetrics, out: &mut Vec<Recommendation>) {
    if m.time_below_range_severe > 1.0 {
        out.push(Recommendation::new(
            Critical,
            "Hypoglycemia",
            "Severe hypoglycemia risk detected",
            "Readings below 54 mg/dL were recorded. Contact your care team promptly to review your basal insulin dose.",
            1,
        ));
    }

    if m.time_below_range > 4.0 {
        out.push(Recommendation::new(
            High,
            "Hypoglycemia",
            "Elevated time below range",
            format!(
                "Your time below range is {:.1}% (target: <4%). Consider lowering basal insulin and reviewing your insulin sensitivity factor.",
                m.time_below_range
            ),
            2,
        ));
    }

    if m.time_above_range > 25.0 {
        out.push(Recommendation::new(
            High,
            "Hyperglycemia",
            "Frequent time above range",
            format!(
                "Your time above range is {:.1}% (target: <25%). Review carbohydrate counting and your insulin-to-carb ratio.",
                m.time_above_range
            ),
            3,
        ));
    }

    if m.cv > 36.0 {
        out.push(Recommendation::new(
            Moderate,
            "Variability",
            "High glycemic variability",
            format!(
                "Your coefficient of variation is {:.1}% (target: <36%). More consistent meal timing and carbohydrate counting can reduce swings.",
                m.cv
            ),
            4,
        ));
    }

    if m.time_in_range < 70.0 {
        out.push(Recommendation::new(
            Moderate,
            "General control",
            "Time in range below target",
            format!(
                "Your time in range is {:.1}% (target: >70%). Work with your care team to adjust treatment.",
                m.time_in_range
            ),
            5,
        ));
    }

    if m.gmi > 7.0 {
        out.push(Recommendation::new(
            Moderate,
            "HbA1c",
            "Elevated GMI",
            format!(
                "Your estimated GMI is {:.1}% (target: <7.0%), which suggests room to improve overall control.",
                m.gmi
            ),
            6,
        ));
    }
}

/// Static guidance for a cluster id
pub fn cluster_guidance(cluster_id: u8) -> Option<Recommendation> {
    let rec = match cluster_id {
        0 => Recommendation::new(
            Info,
            "Cluster",
            "Profile: excellent control",
            "You belong to the group with the best glycemic control. Keep your current habits.",
            12,
        ),
        1 => Recommendation::new(
            Moderate,
            "Cluster",
            "Profile: moderate control",
            "Your control is good with room to improve. Focus on carbohydrate counting and insulin timing.",
            7,
        ),
        2 => Recommendation::new(
            High,
            "Cluster",
            "Profile: high variability",
            "You belong to the high-variability group. Closed-loop technology and advanced carbohydrate counting education may help.",
            3,
        ),
        3 => Recommendation::new(
            High,
            "Cluster",
            "Profile: hypoglycemia risk",
            "You belong to the group with the highest hypoglycemia risk. Reviewing basal insulin with your doctor is the priority.",
            2,
        ),
        4 => Recommendation::new(
            High,
            "Cluster",
            "Profile: suboptimal control",
            "Your glycemic control needs optimization. Schedule a full treatment review with your care team.",
            3,
        ),
        _ => return None,
    };
    Some(rec)
}

fn trend_rule(trend: AnalysisTrend) -> Option<Recommendation> {
    match trend {
        AnalysisTrend::Worsening => Some(Recommendation::new(
            High,
            "Trend",
            "Glycemic control is worsening",
            "Time in range has dropped over the analysis window. Book an appointment to review your treatment.",
            2,
        )),
        AnalysisTrend::Improving => Some(Recommendation::new(
            Info,
            "Trend",
            "Glycemic control is improving",
            "Great work, your time in range is going up. Keep your current habits.",
            10,
        )),
        AnalysisTrend::Stable => None,
    }
}

fn is_excellent(m: &DailyMetrics) -> bool {
    m.time_in_range > 70.0
        && m.cv < 36.0
        && m.time_below_range < 4.0
        && m.time_above_range < 25.0
}

/// Build the recommendation list for a patient
pub fn generate_recommendations(
    cluster_id: u8,
    latest: &DailyMetrics,
    trend: AnalysisTrend,
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    metric_rules(latest, &mut out);
    out.extend(cluster_guidance(cluster_id));
    out.extend(trend_rule(trend));

    if is_excellent(latest) {
        out.push(Recommendation::new(
            Info,
            "General control",
            "Excellent glycemic control",
            "Your glycemic control is within targets. Keep it up!",
            11,
        ));
    }

    // Stable: equal priorities keep rule order
    out.sort_by_key(|r| r.priority);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::metrics::compute_metrics;
    use chrono::NaiveDate;

    fn metrics(values: &[f64]) -> DailyMetrics {
        compute_metrics("P001", NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), values).unwrap()
    }

    #[test]
    fn test_excellent_control() {
        let m = metrics(&[120.0; 12]);
        let recs = generate_recommendations(0, &m, AnalysisTrend::Stable);

        let priorities: Vec<u8> = recs.iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![11, 12]);
        assert_eq!(recs[0].title, "Excellent glycemic control");
    }

    #[test]
    fn test_poor_control_sorted() {
        // 2 severe lows, 3 highs, 5 in range
        let m = metrics(&[45.0, 50.0, 260.0, 270.0, 300.0, 100.0, 110.0, 120.0, 130.0, 140.0]);
        assert!(m.time_below_range_severe > 1.0);

        let recs = generate_recommendations(3, &m, AnalysisTrend::Worsening);
        let priorities: Vec<u8> = recs.iter().map(|r| r.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);

        assert_eq!(recs[0].priority, 1);
        assert_eq!(recs[0].level, RecommendationLevel::Critical);
        assert!(recs.iter().any(|r| r.category == "Trend" && r.level == RecommendationLevel::High));
        assert!(recs.iter().any(|r| r.title == "Profile: hypoglycemia risk"));
        assert!(!recs.iter().any(|r| r.title == "Excellent glycemic control"));
    }

    #[test]
    fn test_cluster_guidance_lookup() {
        assert_eq!(cluster_guidance(0).unwrap().priority, 12);
        assert_eq!(cluster_guidance(1).unwrap().level, RecommendationLevel::Moderate);
        assert_eq!(cluster_guidance(2).unwrap().priority, 3);
        assert_eq!(cluster_guidance(3).unwrap().priority, 2);
        assert_eq!(cluster_guidance(4).unwrap().priority, 3);
        assert!(cluster_guidance(7).is_none());
    }

    #[test]
    fn test_improving_trend_is_info() {
        let m = metrics(&[120.0; 12]);
        let recs = generate_recommendations(1, &m, AnalysisTrend::Improving);
        let trend = recs.iter().find(|r| r.category == "Trend").unwrap();
        assert_eq!(trend.level, RecommendationLevel::Info);
        assert_eq!(trend.priority, 10);
    }
}
