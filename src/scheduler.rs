//! Metrics scheduler
//!
//! Background task that recomputes the previous UTC day's metrics for
//! every patient on a fixed interval.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::analytics::{compute_for_day, AnalyticsError};
use crate::config::SchedulerConfig;
use crate::store::SqliteStore;

/// Outcome of one pass over all patients
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RunSummary {
    pub date: Option<NaiveDate>,
    pub patients_processed: usize,
    pub rows_written: usize,
    /// Patients with too few readings for the day
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub enabled: bool,
    pub running: bool,
    pub interval_hours: u64,
    pub runs: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub last_summary: Option<RunSummary>,
}

pub struct MetricsScheduler {
    store: Arc<SqliteStore>,
    config: SchedulerConfig,
    status: Arc<RwLock<SchedulerStatus>>,
    running: Arc<RwLock<bool>>,
}

/// Recompute one day for every patient
pub fn recompute_day(store: &SqliteStore, date: NaiveDate) -> RunSummary {
    let mut summary = RunSummary {
        date: Some(date),
        ..Default::default()
    };

    let patients = match store.patient_ids() {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list patients");
            summary.errors.push(e.to_string());
            return summary;
        }
    };

    for patient_id in patients {
        summary.patients_processed += 1;
        match compute_for_day(store, &patient_id, date) {
            Ok(_) => summary.rows_written += 1,
            Err(AnalyticsError::InsufficientData { found, .. }) => {
                tracing::debug!(patient_id = %patient_id, date = %date, readings = found, "Skipping day");
                summary.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(patient_id = %patient_id, date = %date, error = %e, "Metrics recompute failed");
                summary.errors.push(format!("{}: {}", patient_id, e));
            }
        }
    }

    summary
}

/// The UTC day before `now`
pub fn previous_day(now: DateTime<Utc>) -> NaiveDate {
    (now - Duration::days(1)).date_naive()
}

impl MetricsScheduler {
    pub fn new(store: Arc<SqliteStore>, config: SchedulerConfig) -> Self {
        let status = SchedulerStatus {
            enabled: config.enabled,
            running: false,
            interval_hours: config.interval_hours,
            runs: 0,
            last_run: None,
            next_run: None,
            last_summary: None,
        };

        Self {
            store,
            config,
            status: Arc::new(RwLock::new(status)),
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.status.read().await.clone()
    }

    /// Recompute `date` now and record the result in the status
    pub async fn run_once(&self, date: NaiveDate) -> RunSummary {
        let store = self.store.clone();
        let summary = match tokio::task::spawn_blocking(move || recompute_day(&store, date)).await {
            Ok(summary) => summary,
            Err(e) => RunSummary {
                date: Some(date),
                errors: vec![format!("recompute task failed: {}", e)],
                ..Default::default()
            },
        };

        tracing::info!(
            date = %date,
            patients = summary.patients_processed,
            rows = summary.rows_written,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "Daily metrics recomputed"
        );

        let now = Utc::now();
        let mut status = self.status.write().await;
        status.runs += 1;
        status.last_run = Some(now);
        status.next_run = Some(now + Duration::hours(self.config.interval_hours as i64));
        status.last_summary = Some(summary.clone());

        summary
    }

    /// Start the background loop; `None` when disabled
    pub fn start(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.enabled {
            tracing::info!("Metrics scheduler disabled");
            return None;
        }

        let scheduler = self.clone();
        let period = std::time::Duration::from_secs(self.config.interval_hours.max(1) * 3600);

        Some(tokio::spawn(async move {
            *scheduler.running.write().await = true;
            scheduler.status.write().await.running = true;

            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;

                if !*scheduler.running.read().await {
                    break;
                }

                scheduler.run_once(previous_day(Utc::now())).await;
            }

            scheduler.status.write().await.running = false;
        }))
    }

    /// Stop after the current pass
    pub async fn stop(&self) {
        *self.running.write().await = false;
        self.status.write().await.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::GlucoseReading;
    use crate::store::{DiabetesType, NewPatient};
    use chrono::TimeZone;

    fn store_with(patients: &[(&str, usize)], date: NaiveDate) -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        for (id, count) in patients {
            store
                .create_patient(&NewPatient {
                    id: id.to_string(),
                    name: "Test".into(),
                    age: 25,
                    diabetes_type: DiabetesType::Type1,
                    diagnosis_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                })
                .unwrap();
            let start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
            let readings: Vec<_> = (0..*count)
                .map(|i| GlucoseReading::new(*id, start + Duration::minutes(5 * i as i64), 130.0))
                .collect();
            store.insert_readings(id, &readings).unwrap();
        }
        store
    }

    #[test]
    fn test_previous_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 30, 0).unwrap();
        assert_eq!(previous_day(now), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_recompute_skips_sparse_patients() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let store = store_with(&[("P001", 12), ("P002", 4)], date);

        let summary = recompute_day(&store, date);
        assert_eq!(summary.patients_processed, 2);
        assert_eq!(summary.rows_written, 1);
        assert_eq!(summary.skipped, 1);
        assert!(summary.errors.is_empty());

        assert!(store.get_daily_metrics("P001", date).unwrap().is_some());
        assert!(store.get_daily_metrics("P002", date).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_once_updates_status() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let store = store_with(&[("P001", 10)], date);
        let scheduler = MetricsScheduler::new(
            store,
            SchedulerConfig {
                enabled: false,
                interval_hours: 24,
            },
        );

        let summary = scheduler.run_once(date).await;
        assert_eq!(summary.rows_written, 1);

        let status = scheduler.status().await;
        assert_eq!(status.runs, 1);
        assert!(status.last_run.is_some());
        assert_eq!(status.last_summary, Some(summary));
    }

    #[tokio::test]
    async fn test_disabled_does_not_start() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let scheduler = Arc::new(MetricsScheduler::new(
            store,
            SchedulerConfig {
                enabled: false,
                interval_hours: 24,
            },
        ));
        assert!(scheduler.start().is_none());
    }
}
