//! Daily metrics calculator
//!
//! Computes glycemic control metrics over one patient-day of readings:
//! mean, population standard deviation, coefficient of variation, the
//! five clinical range bands, GMI and range.
//!
//! Band thresholds (mg/dL):
//! - below range severe: `< 54`
//! - below range: `< 70`
//! - in range: `70..=180`
//! - above range: `> 180`
//! - above range severe: `> 250`

use chrono::NaiveDate;

use super::error::{AnalyticsError, AnalyticsResult};
use super::types::{DailyMetrics, GlucoseReading};
use crate::store::ReadingStore;

/// Days with fewer readings than this produce no metrics
pub const MIN_READINGS_PER_DAY: usize = 10;

pub const SEVERE_LOW_MGDL: f64 = 54.0;
pub const LOW_MGDL: f64 = 70.0;
pub const HIGH_MGDL: f64 = 180.0;
pub const SEVERE_HIGH_MGDL: f64 = 250.0;

const GMI_INTERCEPT: f64 = 3.31;
const GMI_SLOPE: f64 = 0.02392;

/// Whether a value falls in the `[70, 180]` target band
pub fn in_target_range(value: f64) -> bool {
    (LOW_MGDL..=HIGH_MGDL).contains(&value)
}

/// Glucose Management Indicator (%) from a mean glucose in mg/dL
pub fn gmi(mean_mg_dl: f64) -> f64 {
    GMI_INTERCEPT + GMI_SLOPE * mean_mg_dl
}

/// Compute daily metrics for one patient-day
///
/// All readings must belong to the same patient and the same UTC date;
/// the patient and date of the result are taken from them.
pub fn compute_daily_metrics(readings: &[GlucoseReading]) -> AnalyticsResult<DailyMetrics> {
    if readings.len() < MIN_READINGS_PER_DAY {
        return Err(AnalyticsError::readings(readings.len(), MIN_READINGS_PER_DAY));
    }

    let first = &readings[0];
    let date = first.timestamp.date_naive();

    if let Some(other) = readings.iter().find(|r| r.patient_id != first.patient_id) {
        return Err(AnalyticsError::Validation(format!(
            "readings mix patients {} and {}",
            first.patient_id, other.patient_id
        )));
    }
    if let Some(other) = readings.iter().find(|r| r.timestamp.date_naive() != date) {
        return Err(AnalyticsError::Validation(format!(
            "readings span more than one day ({} and {})",
            date,
            other.timestamp.date_naive()
        )));
    }

    let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
    compute_metrics(&first.patient_id, date, &values)
}

/// Compute daily metrics from raw mg/dL values
pub fn compute_metrics(
    patient_id: &str,
    date: NaiveDate,
    values: &[f64],
) -> AnalyticsResult<DailyMetrics> {
    let n = values.len();
    if n < MIN_READINGS_PER_DAY {
        return Err(AnalyticsError::readings(n, MIN_READINGS_PER_DAY));
    }

    let count = n as f64;
    let mean = values.iter().sum::<f64>() / count;
    ensure_finite("mean", mean)?;

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
    let std = variance.sqrt();
    ensure_finite("standard deviation", std)?;

    if mean <= 0.0 {
        return Err(AnalyticsError::Computation(format!(
            "coefficient of variation undefined for mean {}",
            mean
        )));
    }
    let cv = std / mean * 100.0;

    let pct = |pred: fn(f64) -> bool| {
        values.iter().filter(|v| pred(**v)).count() as f64 / count * 100.0
    };

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let metrics = DailyMetrics {
        patient_id: patient_id.to_string(),
        date,
        mean,
        std,
        cv,
        time_in_range: pct(in_target_range),
        time_below_range: pct(|v| v < LOW_MGDL),
        time_below_range_severe: pct(|v| v < SEVERE_LOW_MGDL),
        time_above_range: pct(|v| v > HIGH_MGDL),
        time_above_range_severe: pct(|v| v > SEVERE_HIGH_MGDL),
        gmi: gmi(mean),
        range: max - min,
        median: median(values),
        min,
        max,
        reading_count: n,
    };

    ensure_finite("range", metrics.range)?;
    Ok(metrics)
}

/// Fetch a day's readings, compute its metrics and persist them
pub fn compute_for_day<S: ReadingStore + ?Sized>(
    store: &S,
    patient_id: &str,
    date: NaiveDate,
) -> AnalyticsResult<DailyMetrics> {
    let readings = store.get_readings(patient_id, date)?;
    let metrics = compute_daily_metrics(&readings)?;
    store.upsert_daily_metrics(&metrics)?;

    tracing::debug!(
        patient_id = %patient_id,
        date = %date,
        readings = metrics.reading_count,
        "Daily metrics computed"
    );

    Ok(metrics)
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn ensure_finite(name: &str, value: f64) -> AnalyticsResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AnalyticsError::Computation(format!(
            "{} is not finite ({})",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn readings(values: &[f64]) -> Vec<GlucoseReading> {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| GlucoseReading::new("P001", start + Duration::minutes(5 * i as i64), *v))
            .collect()
    }

    const SCENARIO: [f64; 12] = [
        150.0, 145.0, 142.0, 138.0, 135.0, 140.0, 145.0, 150.0, 155.0, 160.0, 165.0, 170.0,
    ];

    #[test]
    fn test_scenario_day() {
        let m = compute_daily_metrics(&readings(&SCENARIO)).unwrap();

        assert!((m.mean - 1795.0 / 12.0).abs() < 1e-9);
        assert_eq!(m.time_in_range, 100.0);
        assert_eq!(m.time_below_range, 0.0);
        assert_eq!(m.time_above_range, 0.0);
        assert_eq!(m.range, 35.0);
        assert_eq!(m.min, 135.0);
        assert_eq!(m.max, 170.0);
        assert_eq!(m.median, 147.5);
        assert_eq!(m.reading_count, 12);
        assert_eq!(m.patient_id, "P001");
        assert_eq!(m.date, day());
        assert!((m.gmi - (3.31 + 0.02392 * m.mean)).abs() < 1e-12);
    }

    #[test]
    fn test_identical_values() {
        for v in [40.0, 70.0, 120.0, 180.0, 181.0, 300.0] {
            let m = compute_metrics("P001", day(), &[v; 10]).unwrap();
            assert_eq!(m.mean, v);
            assert_eq!(m.std, 0.0);
            assert_eq!(m.cv, 0.0);
            let expected = if (70.0..=180.0).contains(&v) { 100.0 } else { 0.0 };
            assert_eq!(m.time_in_range, expected, "value {}", v);
        }
    }

    #[test]
    fn test_insufficient_readings() {
        let err = compute_daily_metrics(&readings(&SCENARIO[..9])).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::InsufficientData { found: 9, required: 10, .. }
        ));

        let err = compute_daily_metrics(&[]).unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientData { found: 0, .. }));
    }

    #[test]
    fn test_band_boundaries() {
        // 70 and 180 are in range, 250 is above but not severely above,
        // 54 is below but not severely below
        let values = [70.0, 180.0, 250.0, 54.0, 53.0, 251.0, 100.0, 100.0, 100.0, 100.0];
        let m = compute_metrics("P001", day(), &values).unwrap();

        assert_eq!(m.time_in_range, 60.0);
        assert_eq!(m.time_below_range, 20.0);
        assert_eq!(m.time_below_range_severe, 10.0);
        assert_eq!(m.time_above_range, 20.0);
        assert_eq!(m.time_above_range_severe, 10.0);
    }

    #[test]
    fn test_population_std() {
        let values = [100.0, 100.0, 100.0, 100.0, 100.0, 200.0, 200.0, 200.0, 200.0, 200.0];
        let m = compute_metrics("P001", day(), &values).unwrap();
        assert_eq!(m.mean, 150.0);
        assert_eq!(m.std, 50.0);
        assert!((m.cv - 33.333333).abs() < 1e-5);
        assert_eq!(m.median, 150.0);
    }

    #[test]
    fn test_idempotent() {
        let r = readings(&SCENARIO);
        let a = compute_daily_metrics(&r).unwrap();
        let b = compute_daily_metrics(&r).unwrap();
        assert_eq!(a.mean.to_bits(), b.mean.to_bits());
        assert_eq!(a.std.to_bits(), b.std.to_bits());
        assert_eq!(a.cv.to_bits(), b.cv.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_finite_is_computation_error() {
        let mut values = [120.0; 10];
        values[3] = f64::NAN;
        let err = compute_metrics("P001", day(), &values).unwrap_err();
        assert!(matches!(err, AnalyticsError::Computation(_)));

        let err = compute_metrics("P001", day(), &[0.0; 10]).unwrap_err();
        assert!(matches!(err, AnalyticsError::Computation(_)));
    }

    #[test]
    fn test_mixed_days_rejected() {
        let mut r = readings(&SCENARIO);
        r[11].timestamp = r[11].timestamp + Duration::days(1);
        let err = compute_daily_metrics(&r).unwrap_err();
        assert!(matches!(err, AnalyticsError::Validation(_)));

        let mut r = readings(&SCENARIO);
        r[0].patient_id = "P002".to_string();
        assert!(matches!(
            compute_daily_metrics(&r).unwrap_err(),
            AnalyticsError::Validation(_)
        ));
    }
}
