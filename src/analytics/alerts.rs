//! Alert engine
//!
//! Turns a forecast sequence into timed clinical alerts and a summary
//! record. Thresholds are an ordered rule table evaluated top to bottom;
//! the first matching rule wins, so one step yields at most one alert.

use chrono::{DateTime, Utc};

use super::error::{AnalyticsError, AnalyticsResult};
use super::metrics::in_target_range;
use super::types::{
    Alert, AlertCategory, ForecastResult, RiskLevel, Severity, SummaryRecord, Trend,
};

/// Minutes between consecutive forecast steps
pub const STEP_MINUTES: i64 = 5;

/// One row of the alert rule table
#[derive(Debug, Clone, Copy)]
pub struct AlertRule {
    pub category: AlertCategory,
    pub severity: Severity,
    /// Human-readable threshold, e.g. "< 70"
    pub threshold: &'static str,
    matches: fn(f64) -> bool,
}

impl AlertRule {
    pub fn matches(&self, value: f64) -> bool {
        (self.matches)(value)
    }
}

/// Alert rules, most severe first
pub static ALERT_RULES: [AlertRule; 4] = [
    AlertRule {
        category: AlertCategory::HypoglycemiaCritical,
        severity: Severity::Critical,
        threshold: "< 70",
        matches: below_critical,
    },
    AlertRule {
        category: AlertCategory::Hypoglycemia,
        severity: Severity::Warning,
        threshold: "< 80",
        matches: below_low,
    },
    AlertRule {
        category: AlertCategory::HyperglycemiaCritical,
        severity: Severity::Critical,
        threshold: "> 250",
        matches: above_critical,
    },
    AlertRule {
        category: AlertCategory::Hyperglycemia,
        severity: Severity::Warning,
        threshold: "> 180",
        matches: above_high,
    },
];

fn below_critical(v: f64) -> bool {
    v < 70.0
}

fn below_low(v: f64) -> bool {
    v < 80.0
}

fn above_critical(v: f64) -> bool {
    v > 250.0
}

fn above_high(v: f64) -> bool {
    v > 180.0
}

/// First rule a value violates, if any
pub fn classify_value(value: f64) -> Option<&'static AlertRule> {
    ALERT_RULES.iter().find(|rule| rule.matches(value))
}

/// "+{minutes} min" label for a zero-based forecast step
pub fn offset_label(step: usize) -> String {
    format!("+{} min", STEP_MINUTES * (step as i64 + 1))
}

fn alert_message(category: AlertCategory, value: f64) -> String {
    match category {
        AlertCategory::HypoglycemiaCritical => format!(
            "ALERT! Critical glucose: {:.1} mg/dL. Take fast-acting carbohydrates now.",
            value
        ),
        AlertCategory::Hypoglycemia => format!(
            "Low glucose: {:.1} mg/dL. Consider taking carbohydrates.",
            value
        ),
        AlertCategory::HyperglycemiaCritical => format!(
            "ALERT! Very high glucose: {:.1} mg/dL. Apply correction insulin.",
            value
        ),
        AlertCategory::Hyperglycemia => format!(
            "High glucose: {:.1} mg/dL. Monitor and consider a correction.",
            value
        ),
    }
}

/// Evaluate every prediction against the rule table, in order
///
/// Adjacent violations are not merged: each exceeding step alerts.
pub fn evaluate_alerts(predictions: &[f64]) -> Vec<Alert> {
    predictions
        .iter()
        .enumerate()
        .filter_map(|(step, &value)| {
            classify_value(value).map(|rule| Alert {
                offset_label: offset_label(step),
                category: rule.category,
                severity: rule.severity,
                glucose_value: value,
                message: alert_message(rule.category, value),
            })
        })
        .collect()
}

/// Ascending only when the final value is strictly above the current one
pub fn trend(current: f64, final_value: f64) -> Trend {
    if final_value > current {
        Trend::Ascending
    } else {
        Trend::Descending
    }
}

/// Risk level from the most severe alert present
pub fn risk_level(alerts: &[Alert]) -> RiskLevel {
    match alerts.iter().map(|a| a.severity).max() {
        None => RiskLevel::Low,
        Some(Severity::Warning) => RiskLevel::Moderate,
        Some(Severity::Critical) => RiskLevel::High,
    }
}

/// Percentage of values within the `[70, 180]` target band
pub fn time_in_range(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| in_target_range(**v)).count() as f64 / values.len() as f64 * 100.0
}

/// Build a forecast result, taking "current" from the first prediction
pub fn build_forecast_result(
    predictions: Vec<f64>,
    timestamps: Vec<DateTime<Utc>>,
) -> AnalyticsResult<ForecastResult> {
    let current = predictions.first().copied().ok_or_else(|| {
        AnalyticsError::Validation("forecast must contain at least one prediction".to_string())
    })?;
    build_forecast_result_from(current, predictions, timestamps)
}

/// Build a forecast result relative to a known current glucose value
///
/// `delta` is measured from `current`; the trend compares the final
/// prediction with the first one.
pub fn build_forecast_result_from(
    current: f64,
    predictions: Vec<f64>,
    timestamps: Vec<DateTime<Utc>>,
) -> AnalyticsResult<ForecastResult> {
    if predictions.is_empty() {
        return Err(AnalyticsError::Validation(
            "forecast must contain at least one prediction".to_string(),
        ));
    }
    if predictions.len() != timestamps.len() {
        return Err(AnalyticsError::Validation(format!(
            "{} predictions but {} timestamps",
            predictions.len(),
            timestamps.len()
        )));
    }
    if let Some((step, value)) = predictions.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(AnalyticsError::Computation(format!(
            "prediction at step {} is not finite ({})",
            step + 1,
            value
        )));
    }

    let first = predictions[0];
    let final_value = predictions[predictions.len() - 1];
    let min = predictions.iter().copied().fold(f64::INFINITY, f64::min);
    let max = predictions.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = predictions.iter().sum::<f64>() / predictions.len() as f64;

    let alerts = evaluate_alerts(&predictions);

    let summary = SummaryRecord {
        current,
        final_value,
        delta: final_value - current,
        min,
        max,
        mean,
        trend: trend(first, final_value),
        time_in_range: time_in_range(&predictions),
        risk_level: risk_level(&alerts),
    };

    Ok(ForecastResult {
        predictions,
        timestamps,
        alerts,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn timestamps(n: usize) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        (0..n)
            .map(|i| start + Duration::minutes(STEP_MINUTES * (i as i64 + 1)))
            .collect()
    }

    #[test]
    fn test_priority_chain() {
        let cases = [
            (69.9, Some(AlertCategory::HypoglycemiaCritical)),
            (70.0, Some(AlertCategory::Hypoglycemia)),
            (79.9, Some(AlertCategory::Hypoglycemia)),
            (80.0, None),
            (180.0, None),
            (180.1, Some(AlertCategory::Hyperglycemia)),
            (250.0, Some(AlertCategory::Hyperglycemia)),
            (250.1, Some(AlertCategory::HyperglycemiaCritical)),
        ];

        for (value, expected) in cases {
            assert_eq!(classify_value(value).map(|r| r.category), expected, "value {}", value);
        }
    }

    #[test]
    fn test_single_low_step() {
        let predictions = vec![120.0, 100.0, 65.0, 90.0, 110.0];
        let alerts = evaluate_alerts(&predictions);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].category, AlertCategory::HypoglycemiaCritical);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[0].offset_label, "+15 min");
        assert_eq!(alerts[0].glucose_value, 65.0);
        assert!(alerts[0].message.contains("65.0"));
    }

    #[test]
    fn test_every_step_alerts_independently() {
        let predictions = vec![190.0, 195.0, 260.0, 75.0];
        let alerts = evaluate_alerts(&predictions);

        assert_eq!(alerts.len(), 4);
        let labels: Vec<_> = alerts.iter().map(|a| a.offset_label.as_str()).collect();
        assert_eq!(labels, vec!["+5 min", "+10 min", "+15 min", "+20 min"]);
        assert_eq!(alerts[2].category, AlertCategory::HyperglycemiaCritical);
        assert_eq!(alerts[3].category, AlertCategory::Hypoglycemia);
    }

    #[test]
    fn test_alerts_bounded_and_exclusive() {
        let predictions: Vec<f64> = (0..24).map(|i| 40.0 + i as f64 * 12.5).collect();
        let alerts = evaluate_alerts(&predictions);
        assert!(alerts.len() <= predictions.len());

        for alert in &alerts {
            let minutes: usize = alert
                .offset_label
                .trim_start_matches('+')
                .trim_end_matches(" min")
                .parse()
                .unwrap();
            let value = predictions[minutes / 5 - 1];
            assert_eq!(alert.glucose_value, value);

            let first_match = ALERT_RULES.iter().find(|r| r.matches(value)).unwrap();
            assert_eq!(alert.category, first_match.category);
        }
    }

    #[test]
    fn test_scenario_forecast_no_alerts() {
        let predictions = vec![
            150.0, 145.0, 142.0, 138.0, 135.0, 140.0, 145.0, 150.0, 155.0, 160.0, 165.0, 170.0,
        ];
        let result = build_forecast_result(predictions, timestamps(12)).unwrap();

        assert!(result.alerts.is_empty());
        assert_eq!(result.summary.time_in_range, 100.0);
        assert_eq!(result.summary.risk_level, RiskLevel::Low);
        assert_eq!(result.summary.trend, Trend::Ascending);
        assert_eq!(result.summary.current, 150.0);
        assert_eq!(result.summary.final_value, 170.0);
        assert_eq!(result.summary.delta, 20.0);
        assert_eq!(result.summary.min, 135.0);
        assert_eq!(result.summary.max, 170.0);
    }

    #[test]
    fn test_trend_tie_is_descending() {
        assert_eq!(trend(120.0, 120.0), Trend::Descending);
        assert_eq!(trend(120.0, 119.0), Trend::Descending);
        assert_eq!(trend(120.0, 121.0), Trend::Ascending);
    }

    #[test]
    fn test_risk_level() {
        assert_eq!(risk_level(&[]), RiskLevel::Low);

        let warnings = evaluate_alerts(&[75.0, 190.0]);
        assert_eq!(risk_level(&warnings), RiskLevel::Moderate);

        let mixed = evaluate_alerts(&[75.0, 190.0, 260.0]);
        assert_eq!(risk_level(&mixed), RiskLevel::High);
    }

    #[test]
    fn test_current_from_history() {
        let result =
            build_forecast_result_from(110.0, vec![120.0, 125.0, 118.0], timestamps(3)).unwrap();
        assert_eq!(result.summary.current, 110.0);
        assert_eq!(result.summary.delta, 8.0);
        // Trend compares against the first prediction, not the current value
        assert_eq!(result.summary.trend, Trend::Descending);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            build_forecast_result(vec![], vec![]).unwrap_err(),
            AnalyticsError::Validation(_)
        ));
        assert!(matches!(
            build_forecast_result(vec![100.0, 110.0], timestamps(1)).unwrap_err(),
            AnalyticsError::Validation(_)
        ));
        assert!(matches!(
            build_forecast_result(vec![100.0, f64::NAN], timestamps(2)).unwrap_err(),
            AnalyticsError::Computation(_)
        ));
    }
}
