//! Persistence
//!
//! A single SQLite database holds patients, readings, daily metrics,
//! cluster history and the food catalog. The analytics core only needs
//! [`ReadingStore`]; everything else is inherent on [`SqliteStore`].

mod error;
pub mod foods;
mod sqlite;
mod types;

pub use error::{StoreError, StoreResult};
pub use foods::CATEGORIES as FOOD_CATEGORIES;
pub use sqlite::SqliteStore;
pub use types::{
    CarbLine, CarbSelection, CarbTotal, ClusterAssignment, DiabetesType, Food, FoodStats,
    NewPatient, Patient,
};

use chrono::NaiveDate;

use crate::analytics::{DailyMetrics, GlucoseReading};

/// What the metrics calculator needs from storage
pub trait ReadingStore: Send + Sync {
    /// Readings for one patient-day, oldest first
    fn get_readings(&self, patient_id: &str, date: NaiveDate) -> StoreResult<Vec<GlucoseReading>>;

    /// Insert or replace the metrics row for (patient, date)
    fn upsert_daily_metrics(&self, metrics: &DailyMetrics) -> StoreResult<()>;
}
