//! Forecaster invocation wrapper
//!
//! Validates a forecast request, assembles the 12-row history matrix and
//! the N-row future action matrix, invokes the injected [`Forecaster`] and
//! hands its output to the alert engine.
//!
//! Feature row layout (11 columns):
//!
//! | idx | feature |
//! |-----|---------|
//! | 0 | glucose (mg/dL, 0 for future rows) |
//! | 1 | carbs (g) |
//! | 2 | bolus (U) |
//! | 3-4 | hour sin/cos |
//! | 5-6 | weekday sin/cos (Monday = 0) |
//! | 7 | time period (hour / 6) |
//! | 8 | weekend flag |
//! | 9 | exercise intensity (0-10) |
//! | 10 | exercise duration (min) |

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::alerts::{build_forecast_result_from, STEP_MINUTES};
use super::error::{AnalyticsError, AnalyticsResult};
use super::types::ForecastResult;
use super::units::{MAX_GLUCOSE_MGDL, MIN_GLUCOSE_MGDL};
use crate::models::Forecaster;

/// Number of historical readings the model consumes
pub const HISTORY_WINDOW: usize = 12;

/// Largest forecast horizon, in 5-minute steps
pub const MAX_STEPS: usize = 24;

/// Default forecast horizon (one hour)
pub const DEFAULT_STEPS: usize = 12;

pub const FEATURE_COUNT: usize = 11;

/// One row of the model's feature matrix
pub type FeatureRow = [f64; FEATURE_COUNT];

/// A historical record: a glucose reading plus the care actions around it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub timestamp: DateTime<Utc>,
    /// mg/dL
    pub glucose: f64,
    pub carbs: f64,
    pub bolus: f64,
    pub exercise_intensity: f64,
    pub exercise_duration: f64,
}

/// Care actions planned for one future step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CareAction {
    pub carbs: f64,
    pub bolus: f64,
    pub exercise_intensity: f64,
    pub exercise_duration: f64,
}

/// A forecast request; validated by [`build_input`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub history: Vec<HistoricalRecord>,
    pub actions: Vec<CareAction>,
    #[serde(default = "default_steps")]
    pub steps: usize,
}

fn default_steps() -> usize {
    DEFAULT_STEPS
}

/// Model input: the shaped feature matrices
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastInput {
    pub history: Vec<FeatureRow>,
    /// One row per requested step; glucose column is zero
    pub future: Vec<FeatureRow>,
    pub timestamps: Vec<DateTime<Utc>>,
}

impl ForecastInput {
    pub fn steps(&self) -> usize {
        self.future.len()
    }
}

/// Cyclical time features for a timestamp: hour sin/cos, weekday sin/cos,
/// time period and weekend flag
pub fn time_features(ts: &DateTime<Utc>) -> [f64; 6] {
    let hour = ts.hour() as f64 + ts.minute() as f64 / 60.0;
    let weekday = ts.weekday().num_days_from_monday() as f64;

    [
        (2.0 * PI * hour / 24.0).sin(),
        (2.0 * PI * hour / 24.0).cos(),
        (2.0 * PI * weekday / 7.0).sin(),
        (2.0 * PI * weekday / 7.0).cos(),
        (ts.hour() / 6) as f64,
        if weekday >= 5.0 { 1.0 } else { 0.0 },
    ]
}

fn feature_row(ts: &DateTime<Utc>, glucose: f64, action: &CareAction) -> FeatureRow {
    let t = time_features(ts);
    [
        glucose,
        action.carbs,
        action.bolus,
        t[0],
        t[1],
        t[2],
        t[3],
        t[4],
        t[5],
        action.exercise_intensity,
        action.exercise_duration,
    ]
}

impl HistoricalRecord {
    fn action(&self) -> CareAction {
        CareAction {
            carbs: self.carbs,
            bolus: self.bolus,
            exercise_intensity: self.exercise_intensity,
            exercise_duration: self.exercise_duration,
        }
    }

    pub fn features(&self) -> FeatureRow {
        feature_row(&self.timestamp, self.glucose, &self.action())
    }
}

fn validate_action(action: &CareAction, context: &str) -> AnalyticsResult<()> {
    let fields = [
        ("carbs", action.carbs),
        ("bolus", action.bolus),
        ("exercise_intensity", action.exercise_intensity),
        ("exercise_duration", action.exercise_duration),
    ];
    for (name, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(AnalyticsError::Validation(format!(
                "{}: {} must be a non-negative number, got {}",
                context, name, value
            )));
        }
    }
    if action.exercise_intensity > 10.0 {
        return Err(AnalyticsError::Validation(format!(
            "{}: exercise_intensity must be between 0 and 10, got {}",
            context, action.exercise_intensity
        )));
    }
    Ok(())
}

/// Validate a request and shape it into model input
pub fn build_input(request: &ForecastRequest) -> AnalyticsResult<ForecastInput> {
    if request.history.len() != HISTORY_WINDOW {
        return Err(AnalyticsError::Validation(format!(
            "exactly {} historical readings required, got {}",
            HISTORY_WINDOW,
            request.history.len()
        )));
    }
    if !(1..=MAX_STEPS).contains(&request.steps) {
        return Err(AnalyticsError::Validation(format!(
            "steps must be between 1 and {}, got {}",
            MAX_STEPS, request.steps
        )));
    }
    if !(1..=MAX_STEPS).contains(&request.actions.len()) {
        return Err(AnalyticsError::Validation(format!(
            "between 1 and {} future actions required, got {}",
            MAX_STEPS,
            request.actions.len()
        )));
    }

    for (i, record) in request.history.iter().enumerate() {
        let context = format!("history[{}]", i);
        if !record.glucose.is_finite()
            || !(MIN_GLUCOSE_MGDL..=MAX_GLUCOSE_MGDL).contains(&record.glucose)
        {
            return Err(AnalyticsError::Validation(format!(
                "{}: glucose must be between {} and {} mg/dL, got {}",
                context, MIN_GLUCOSE_MGDL, MAX_GLUCOSE_MGDL, record.glucose
            )));
        }
        validate_action(&record.action(), &context)?;
    }
    for (i, action) in request.actions.iter().enumerate() {
        validate_action(action, &format!("actions[{}]", i))?;
    }

    let history: Vec<FeatureRow> = request.history.iter().map(|r| r.features()).collect();

    // History length was checked above
    let last_ts = request.history[HISTORY_WINDOW - 1].timestamp;
    let idle = CareAction::default();

    let timestamps: Vec<DateTime<Utc>> = (0..request.steps)
        .map(|step| last_ts + Duration::minutes(STEP_MINUTES * (step as i64 + 1)))
        .collect();

    let future = timestamps
        .iter()
        .enumerate()
        .map(|(step, ts)| feature_row(ts, 0.0, request.actions.get(step).unwrap_or(&idle)))
        .collect();

    Ok(ForecastInput {
        history,
        future,
        timestamps,
    })
}

/// Run a forecast request end to end
pub async fn forecast(
    forecaster: &dyn Forecaster,
    request: &ForecastRequest,
) -> AnalyticsResult<ForecastResult> {
    let input = build_input(request)?;

    tracing::debug!(
        forecaster = forecaster.name(),
        steps = input.steps(),
        "Invoking forecaster"
    );

    let predictions = forecaster.predict(&input).await?;

    if predictions.len() != input.steps() {
        return Err(AnalyticsError::Computation(format!(
            "forecaster returned {} values for {} steps",
            predictions.len(),
            input.steps()
        )));
    }

    let current = request.history[HISTORY_WINDOW - 1].glucose;
    let result = build_forecast_result_from(current, predictions, input.timestamps)?;

    tracing::info!(
        forecaster = forecaster.name(),
        steps = result.predictions.len(),
        alerts = result.alerts.len(),
        risk = ?result.summary.risk_level,
        "Forecast completed"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::types::{AlertCategory, RiskLevel};
    use crate::models::testing::{FailingForecaster, FixedForecaster};
    use chrono::TimeZone;

    fn history() -> Vec<HistoricalRecord> {
        // Monday 2024-01-15 07:05 .. 08:00
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 7, 5, 0).unwrap();
        let values = [
            150.0, 145.0, 142.0, 138.0, 135.0, 140.0, 145.0, 150.0, 155.0, 160.0, 165.0, 170.0,
        ];
        values
            .iter()
            .enumerate()
            .map(|(i, v)| HistoricalRecord {
                timestamp: start + Duration::minutes(5 * i as i64),
                glucose: *v,
                carbs: 0.0,
                bolus: 0.0,
                exercise_intensity: 0.0,
                exercise_duration: 0.0,
            })
            .collect()
    }

    fn request(steps: usize) -> ForecastRequest {
        ForecastRequest {
            history: history(),
            actions: vec![CareAction {
                carbs: 45.0,
                bolus: 4.0,
                exercise_intensity: 0.0,
                exercise_duration: 0.0,
            }],
            steps,
        }
    }

    #[test]
    fn test_time_features() {
        // Saturday 18:30
        let ts = Utc.with_ymd_and_hms(2024, 1, 20, 18, 30, 0).unwrap();
        let f = time_features(&ts);
        let hour = 18.5_f64;
        assert!((f[0] - (2.0 * PI * hour / 24.0).sin()).abs() < 1e-12);
        assert!((f[1] - (2.0 * PI * hour / 24.0).cos()).abs() < 1e-12);
        assert!((f[2] - (2.0 * PI * 5.0 / 7.0).sin()).abs() < 1e-12);
        assert_eq!(f[4], 3.0);
        assert_eq!(f[5], 1.0);

        // Monday midnight
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let f = time_features(&ts);
        assert_eq!(f[0], 0.0);
        assert_eq!(f[1], 1.0);
        assert_eq!(f[2], 0.0);
        assert_eq!(f[4], 0.0);
        assert_eq!(f[5], 0.0);
    }

    #[test]
    fn test_build_input_shapes() {
        let input = build_input(&request(6)).unwrap();
        assert_eq!(input.history.len(), HISTORY_WINDOW);
        assert_eq!(input.future.len(), 6);
        assert_eq!(input.timestamps.len(), 6);

        // First future step carries the planned meal, the rest are idle
        assert_eq!(input.future[0][1], 45.0);
        assert_eq!(input.future[0][2], 4.0);
        assert_eq!(input.future[1][1], 0.0);
        assert_eq!(input.future[0][0], 0.0);

        let last = history()[11].timestamp;
        assert_eq!(input.timestamps[0], last + Duration::minutes(5));
        assert_eq!(input.timestamps[5], last + Duration::minutes(30));

        assert_eq!(input.history[11][0], 170.0);
    }

    #[test]
    fn test_history_window_must_be_twelve() {
        let mut req = request(6);
        req.history.pop();
        let err = build_input(&req).unwrap_err();
        assert!(matches!(err, AnalyticsError::Validation(_)));
    }

    #[test]
    fn test_steps_bounds() {
        assert!(build_input(&request(1)).is_ok());
        assert!(build_input(&request(24)).is_ok());
        assert!(matches!(
            build_input(&request(0)).unwrap_err(),
            AnalyticsError::Validation(_)
        ));
        assert!(matches!(
            build_input(&request(25)).unwrap_err(),
            AnalyticsError::Validation(_)
        ));

        let mut req = request(6);
        req.actions.clear();
        assert!(matches!(build_input(&req).unwrap_err(), AnalyticsError::Validation(_)));

        let mut req = request(6);
        req.actions = vec![CareAction::default(); 25];
        assert!(matches!(build_input(&req).unwrap_err(), AnalyticsError::Validation(_)));
    }

    #[test]
    fn test_field_ranges() {
        let mut req = request(6);
        req.history[3].glucose = 700.0;
        assert!(build_input(&req).is_err());

        let mut req = request(6);
        req.actions[0].exercise_intensity = 11.0;
        assert!(build_input(&req).is_err());

        let mut req = request(6);
        req.history[0].carbs = -1.0;
        assert!(build_input(&req).is_err());
    }

    #[tokio::test]
    async fn test_forecast_with_stub() {
        let forecaster = FixedForecaster::new(vec![168.0, 150.0, 65.0, 90.0]);
        let result = forecast(&forecaster, &request(4)).await.unwrap();

        assert_eq!(result.predictions, vec![168.0, 150.0, 65.0, 90.0]);
        assert_eq!(result.alerts.len(), 1);
        assert_eq!(result.alerts[0].category, AlertCategory::HypoglycemiaCritical);
        assert_eq!(result.alerts[0].offset_label, "+15 min");
        assert_eq!(result.summary.current, 170.0);
        assert_eq!(result.summary.delta, -80.0);
        assert_eq!(result.summary.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_forecast_wrong_length_is_computation_error() {
        let forecaster = FixedForecaster::new(vec![120.0, 121.0]);
        let err = forecast(&forecaster, &request(4)).await.unwrap_err();
        assert!(matches!(err, AnalyticsError::Computation(_)));
    }

    #[tokio::test]
    async fn test_forecast_unavailable() {
        let err = forecast(&FailingForecaster, &request(4)).await.unwrap_err();
        assert!(matches!(err, AnalyticsError::ModelUnavailable(_)));
    }
}
