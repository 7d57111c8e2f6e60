//! SQLite-backed store
//!
//! One connection behind a mutex, WAL journaling and foreign keys on so
//! deleting a patient cascades to its readings, metrics and cluster
//! history. Timestamps are stored as UTC milliseconds, dates as
//! `YYYY-MM-DD` text.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::error::{StoreError, StoreResult};
use super::types::{ClusterAssignment, DiabetesType, NewPatient, Patient};
use super::ReadingStore;
use crate::analytics::{DailyMetrics, GlucoseReading};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    age INTEGER NOT NULL,
    diabetes_type TEXT NOT NULL,
    diagnosis_date TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    current_cluster INTEGER,
    last_analysis_date INTEGER
);

CREATE TABLE IF NOT EXISTS glucose_readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    timestamp INTEGER NOT NULL,
    value REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_readings_patient_time
    ON glucose_readings(patient_id, timestamp);

CREATE TABLE IF NOT EXISTS daily_metrics (
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    mean REAL NOT NULL,
    std REAL NOT NULL,
    cv REAL NOT NULL,
    time_in_range REAL NOT NULL,
    time_below_range REAL NOT NULL,
    time_below_range_severe REAL NOT NULL,
    time_above_range REAL NOT NULL,
    time_above_range_severe REAL NOT NULL,
    gmi REAL NOT NULL,
    glucose_range REAL NOT NULL,
    median REAL NOT NULL,
    min_value REAL NOT NULL,
    max_value REAL NOT NULL,
    reading_count INTEGER NOT NULL,
    computed_at INTEGER NOT NULL,
    PRIMARY KEY (patient_id, date)
);

CREATE TABLE IF NOT EXISTS cluster_assignments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    cluster_id INTEGER NOT NULL,
    cluster_name TEXT NOT NULL,
    confidence_score REAL NOT NULL,
    assigned_at INTEGER NOT NULL,
    avg_tir REAL NOT NULL,
    avg_cv REAL NOT NULL,
    avg_gmi REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_assignments_patient
    ON cluster_assignments(patient_id, assigned_at);

CREATE TABLE IF NOT EXISTS foods (
    category TEXT NOT NULL,
    id INTEGER NOT NULL,
    name TEXT NOT NULL,
    base_dish TEXT,
    image TEXT,
    suggested_amount REAL NOT NULL,
    unit TEXT NOT NULL,
    gross_weight_g REAL NOT NULL,
    net_weight_g REAL NOT NULL,
    energy_kcal REAL NOT NULL,
    protein_g REAL NOT NULL,
    lipids_g REAL NOT NULL,
    carbohydrates_g REAL NOT NULL,
    PRIMARY KEY (category, id)
);
";

const PATIENT_COLUMNS: &str = "id, name, age, diabetes_type, diagnosis_date, created_at, \
     current_cluster, last_analysis_date";

const METRICS_COLUMNS: &str = "patient_id, date, mean, std, cv, time_in_range, \
     time_below_range, time_below_range_severe, time_above_range, time_above_range_severe, \
     gmi, glucose_range, median, min_value, max_value, reading_count";

/// Glucose store on a single SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create a database file
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let store = Self::init(conn, Some(path.to_path_buf()))?;
        tracing::info!(path = %path.display(), "Store opened");
        Ok(store)
    }

    /// Private in-memory database
    pub fn in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(super) fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    /// Cheap liveness probe
    pub fn ping(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    // ============================================
    // Patients
    // ============================================

    pub fn create_patient(&self, new: &NewPatient) -> StoreResult<Patient> {
        let patient = Patient {
            id: new.id.trim().to_string(),
            name: new.name.trim().to_string(),
            age: new.age,
            diabetes_type: new.diabetes_type,
            diagnosis_date: new.diagnosis_date,
            created_at: now_millis_precision(),
            current_cluster: None,
            last_analysis_date: None,
        };

        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO patients (id, name, age, diabetes_type, diagnosis_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                patient.id,
                patient.name,
                patient.age,
                patient.diabetes_type.as_str(),
                patient.diagnosis_date.to_string(),
                patient.created_at.timestamp_millis(),
            ],
        )?;

        if inserted == 0 {
            return Err(StoreError::Conflict(format!("patient {}", patient.id)));
        }

        tracing::info!(patient_id = %patient.id, "Patient created");
        Ok(patient)
    }

    pub fn get_patient(&self, id: &str) -> StoreResult<Option<Patient>> {
        let conn = self.conn()?;
        let patient = conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE id = ?1", PATIENT_COLUMNS),
                params![id],
                patient_from_row,
            )
            .optional()?;
        Ok(patient)
    }

    /// Like [`get_patient`](Self::get_patient) but missing is an error
    pub fn require_patient(&self, id: &str) -> StoreResult<Patient> {
        self.get_patient(id)?
            .ok_or_else(|| StoreError::NotFound(format!("patient {}", id)))
    }

    pub fn list_patients(&self) -> StoreResult<Vec<Patient>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM patients ORDER BY id",
            PATIENT_COLUMNS
        ))?;
        let patients = stmt
            .query_map([], patient_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(patients)
    }

    pub fn patient_ids(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM patients ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Delete a patient and everything recorded for them
    pub fn delete_patient(&self, id: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM patients WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("patient {}", id)));
        }
        tracing::info!(patient_id = %id, "Patient deleted");
        Ok(())
    }

    // ============================================
    // Readings
    // ============================================

    pub fn insert_reading(&self, reading: &GlucoseReading) -> StoreResult<()> {
        self.insert_readings(&reading.patient_id, std::slice::from_ref(reading))
            .map(|_| ())
    }

    /// Insert a batch of readings for one patient in a single transaction
    ///
    /// Returns the number of rows written.
    pub fn insert_readings(&self, patient_id: &str, readings: &[GlucoseReading]) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM patients WHERE id = ?1",
                params![patient_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(StoreError::NotFound(format!("patient {}", patient_id)));
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO glucose_readings (patient_id, timestamp, value) VALUES (?1, ?2, ?3)",
            )?;
            for reading in readings {
                if reading.patient_id != patient_id {
                    return Err(StoreError::Invalid(format!(
                        "reading for {} in batch for {}",
                        reading.patient_id, patient_id
                    )));
                }
                stmt.execute(params![
                    patient_id,
                    reading.timestamp.timestamp_millis(),
                    reading.value
                ])?;
            }
        }

        tx.commit()?;

        tracing::debug!(patient_id = %patient_id, count = readings.len(), "Readings stored");
        Ok(readings.len())
    }

    /// Readings for one UTC day, oldest first
    pub fn readings_for_day(&self, patient_id: &str, date: NaiveDate) -> StoreResult<Vec<GlucoseReading>> {
        let start = day_start_millis(date);
        let end = start + Duration::days(1).num_milliseconds();

        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT patient_id, timestamp, value FROM glucose_readings
             WHERE patient_id = ?1 AND timestamp >= ?2 AND timestamp < ?3
             ORDER BY timestamp, id",
        )?;
        let readings = stmt
            .query_map(params![patient_id, start, end], reading_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(readings)
    }

    /// Most recent readings, newest first
    pub fn recent_readings(&self, patient_id: &str, limit: usize) -> StoreResult<Vec<GlucoseReading>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT patient_id, timestamp, value FROM glucose_readings
             WHERE patient_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
        )?;
        let readings = stmt
            .query_map(params![patient_id, limit as i64], reading_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(readings)
    }

    /// Delete all readings for a patient, returning how many were removed
    pub fn delete_readings(&self, patient_id: &str) -> StoreResult<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM glucose_readings WHERE patient_id = ?1",
            params![patient_id],
        )?;
        tracing::info!(patient_id = %patient_id, deleted, "Readings deleted");
        Ok(deleted)
    }

    // ============================================
    // Daily metrics
    // ============================================

    /// Insert or replace the row for (patient, date)
    pub fn save_daily_metrics(&self, m: &DailyMetrics) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO daily_metrics ({}, computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                 ON CONFLICT(patient_id, date) DO UPDATE SET
                    mean = excluded.mean,
                    std = excluded.std,
                    cv = excluded.cv,
                    time_in_range = excluded.time_in_range,
                    time_below_range = excluded.time_below_range,
                    time_below_range_severe = excluded.time_below_range_severe,
                    time_above_range = excluded.time_above_range,
                    time_above_range_severe = excluded.time_above_range_severe,
                    gmi = excluded.gmi,
                    glucose_range = excluded.glucose_range,
                    median = excluded.median,
                    min_value = excluded.min_value,
                    max_value = excluded.max_value,
                    reading_count = excluded.reading_count,
                    computed_at = excluded.computed_at",
                METRICS_COLUMNS
            ),
            params![
                m.patient_id,
                m.date.to_string(),
                m.mean,
                m.std,
                m.cv,
                m.time_in_range,
                m.time_below_range,
                m.time_below_range_severe,
                m.time_above_range,
                m.time_above_range_severe,
                m.gmi,
                m.range,
                m.median,
                m.min,
                m.max,
                m.reading_count as i64,
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    pub fn get_daily_metrics(&self, patient_id: &str, date: NaiveDate) -> StoreResult<Option<DailyMetrics>> {
        let conn = self.conn()?;
        let metrics = conn
            .query_row(
                &format!(
                    "SELECT {} FROM daily_metrics WHERE patient_id = ?1 AND date = ?2",
                    METRICS_COLUMNS
                ),
                params![patient_id, date.to_string()],
                metrics_from_row,
            )
            .optional()?;
        Ok(metrics)
    }

    /// Metrics rows with `start <= date <= end`, oldest first
    pub fn daily_metrics_range(
        &self,
        patient_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<DailyMetrics>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM daily_metrics
             WHERE patient_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date",
            METRICS_COLUMNS
        ))?;
        let rows = stmt
            .query_map(
                params![patient_id, start.to_string(), end.to_string()],
                metrics_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ============================================
    // Cluster assignments
    // ============================================

    /// Append an assignment and make it the patient's current cluster
    pub fn record_cluster_assignment(&self, a: &ClusterAssignment) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE patients SET current_cluster = ?2, last_analysis_date = ?3 WHERE id = ?1",
            params![a.patient_id, a.cluster_id, a.assigned_at.timestamp_millis()],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("patient {}", a.patient_id)));
        }

        tx.execute(
            "INSERT INTO cluster_assignments
                (patient_id, cluster_id, cluster_name, confidence_score, assigned_at, avg_tir, avg_cv, avg_gmi)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                a.patient_id,
                a.cluster_id,
                a.cluster_name,
                a.confidence_score,
                a.assigned_at.timestamp_millis(),
                a.avg_tir,
                a.avg_cv,
                a.avg_gmi,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Assignment history, newest first
    pub fn cluster_assignments(&self, patient_id: &str) -> StoreResult<Vec<ClusterAssignment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT patient_id, cluster_id, cluster_name, confidence_score, assigned_at, avg_tir, avg_cv, avg_gmi
             FROM cluster_assignments WHERE patient_id = ?1
             ORDER BY assigned_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map(params![patient_id], |row| {
                Ok(ClusterAssignment {
                    patient_id: row.get(0)?,
                    cluster_id: row.get(1)?,
                    cluster_name: row.get(2)?,
                    confidence_score: row.get(3)?,
                    assigned_at: millis_to_utc(4, row.get(4)?)?,
                    avg_tir: row.get(5)?,
                    avg_cv: row.get(6)?,
                    avg_gmi: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl ReadingStore for SqliteStore {
    fn get_readings(&self, patient_id: &str, date: NaiveDate) -> StoreResult<Vec<GlucoseReading>> {
        self.readings_for_day(patient_id, date)
    }

    fn upsert_daily_metrics(&self, metrics: &DailyMetrics) -> StoreResult<()> {
        self.save_daily_metrics(metrics)
    }
}

// ============================================
// Row mapping
// ============================================

fn conversion_error<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

#[derive(Debug)]
struct BadValue(String);

impl std::fmt::Display for BadValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for BadValue {}

fn millis_to_utc(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| conversion_error(idx, Type::Integer, BadValue(format!("timestamp {}", ms))))
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| conversion_error(idx, Type::Text, e))
}

fn day_start_millis(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or_default()
}

/// Current time truncated to what the store round-trips
fn now_millis_precision() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.timestamp_millis_opt(now.timestamp_millis())
        .single()
        .unwrap_or(now)
}

fn reading_from_row(row: &Row<'_>) -> rusqlite::Result<GlucoseReading> {
    Ok(GlucoseReading {
        patient_id: row.get(0)?,
        timestamp: millis_to_utc(1, row.get(1)?)?,
        value: row.get(2)?,
    })
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    let diabetes_type: String = row.get(3)?;
    let diagnosis_date: String = row.get(4)?;
    let last_analysis: Option<i64> = row.get(7)?;

    Ok(Patient {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        diabetes_type: DiabetesType::parse(&diabetes_type).ok_or_else(|| {
            conversion_error(3, Type::Text, BadValue(format!("diabetes type {}", diabetes_type)))
        })?,
        diagnosis_date: parse_date(4, &diagnosis_date)?,
        created_at: millis_to_utc(5, row.get(5)?)?,
        current_cluster: row.get(6)?,
        last_analysis_date: last_analysis.map(|ms| millis_to_utc(7, ms)).transpose()?,
    })
}

fn metrics_from_row(row: &Row<'_>) -> rusqlite::Result<DailyMetrics> {
    let date: String = row.get(1)?;
    let reading_count: i64 = row.get(15)?;

    Ok(DailyMetrics {
        patient_id: row.get(0)?,
        date: parse_date(1, &date)?,
        mean: row.get(2)?,
        std: row.get(3)?,
        cv: row.get(4)?,
        time_in_range: row.get(5)?,
        time_below_range: row.get(6)?,
        time_below_range_severe: row.get(7)?,
        time_above_range: row.get(8)?,
        time_above_range_severe: row.get(9)?,
        gmi: row.get(10)?,
        range: row.get(11)?,
        median: row.get(12)?,
        min: row.get(13)?,
        max: row.get(14)?,
        reading_count: reading_count.max(0) as usize,
    })
}
