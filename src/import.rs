//! CSV Import
//!
//! Reads glucose exports (meter or CGM downloads) into readings.
//! Columns can be given explicitly or detected from the header row, and
//! timestamps are tried against several common formats.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::io::Read;
use std::path::Path;

use crate::analytics::{normalize_glucose, GlucoseReading, GlucoseUnit};

/// Errors that stop an import as a whole; bad rows are reported per line
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Could not find a {0} column in the header")]
    MissingColumn(&'static str),
}

/// CSV importer with configurable column mapping
#[derive(Debug, Clone)]
pub struct ReadingCsvImporter {
    patient_id: String,
    timestamp_column: usize,
    value_column: usize,
    timestamp_format: Option<String>,
    unit: GlucoseUnit,
    has_header: bool,
    detect_columns: bool,
}

/// Result of a CSV import
#[derive(Debug, Default)]
pub struct ImportResult {
    pub readings: Vec<GlucoseReading>,
    pub rows_processed: usize,
    pub rows_failed: usize,
    pub errors: Vec<String>,
}

const MAX_REPORTED_ERRORS: usize = 100;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M",
];

const TIMESTAMP_HEADERS: &[&str] = &["timestamp", "datetime", "date", "time", "fecha", "hora"];
const VALUE_HEADERS: &[&str] = &["glucose", "glucosa", "value", "valor", "sgv", "bg", "reading"];

impl ReadingCsvImporter {
    /// Importer for `timestamp,value` files with a header row
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            timestamp_column: 0,
            value_column: 1,
            timestamp_format: None,
            unit: GlucoseUnit::MgDl,
            has_header: true,
            detect_columns: false,
        }
    }

    pub fn with_timestamp_column(mut self, column: usize) -> Self {
        self.timestamp_column = column;
        self
    }

    pub fn with_value_column(mut self, column: usize) -> Self {
        self.value_column = column;
        self
    }

    /// Try this chrono format before the built-in list
    pub fn with_timestamp_format(mut self, format: &str) -> Self {
        self.timestamp_format = Some(format.to_string());
        self
    }

    pub fn with_unit(mut self, unit: GlucoseUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Pick the columns from header names instead of positions
    pub fn detect_columns(mut self) -> Self {
        self.detect_columns = true;
        self.has_header = true;
        self
    }

    fn apply_header(&mut self, headers: &csv::StringRecord) -> Result<(), ImportError> {
        let find = |names: &[&str]| {
            headers.iter().position(|h| {
                let h = h.trim().to_lowercase();
                names.iter().any(|n| h.contains(n))
            })
        };

        let value = find(VALUE_HEADERS).ok_or(ImportError::MissingColumn("glucose"))?;
        let timestamp = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != value)
            .find(|(_, h)| {
                let h = h.trim().to_lowercase();
                TIMESTAMP_HEADERS.iter().any(|n| h.contains(n))
            })
            .map(|(idx, _)| idx)
            .ok_or(ImportError::MissingColumn("timestamp"))?;

        self.timestamp_column = timestamp;
        self.value_column = value;
        Ok(())
    }

    /// Parse a timestamp; naive times are taken as UTC
    pub fn parse_timestamp(&self, ts_str: &str) -> Option<DateTime<Utc>> {
        if let Some(format) = &self.timestamp_format {
            if let Ok(dt) = NaiveDateTime::parse_from_str(ts_str, format) {
                return Some(dt.and_utc());
            }
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(ts_str) {
            return Some(dt.with_timezone(&Utc));
        }

        for fmt in TIMESTAMP_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(ts_str, fmt) {
                return Some(dt.and_utc());
            }
        }

        // Unix epoch, seconds or milliseconds
        if let Ok(epoch) = ts_str.parse::<i64>() {
            return if epoch > 100_000_000_000 {
                Utc.timestamp_millis_opt(epoch).single()
            } else {
                Utc.timestamp_opt(epoch, 0).single()
            };
        }

        None
    }

    /// Import from a file
    pub fn import(&self, path: &Path) -> Result<ImportResult, ImportError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(self.has_header)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        self.read_all(reader)
    }

    /// Import from a CSV string
    pub fn import_str(&self, csv_data: &str) -> Result<ImportResult, ImportError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(self.has_header)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(csv_data.as_bytes());
        self.read_all(reader)
    }

    fn read_all<R: Read>(&self, mut reader: csv::Reader<R>) -> Result<ImportResult, ImportError> {
        let mut importer = self.clone();
        if self.detect_columns {
            let headers = reader.headers()?.clone();
            importer.apply_header(&headers)?;
        }

        let mut result = ImportResult::default();
        let fail = |result: &mut ImportResult, line: usize, msg: String| {
            result.rows_failed += 1;
            result.errors.push(format!("Line {}: {}", line, msg));
        };

        for (line_num, record) in reader.records().enumerate() {
            let line = if importer.has_header {
                line_num + 2
            } else {
                line_num + 1
            };

            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    fail(&mut result, line, e.to_string());
                    continue;
                }
            };

            let (Some(ts_str), Some(value_str)) = (
                record.get(importer.timestamp_column),
                record.get(importer.value_column),
            ) else {
                fail(&mut result, line, "missing column".to_string());
                continue;
            };

            // Blank glucose cells are common in CGM exports (calibration rows)
            if value_str.is_empty() {
                continue;
            }

            let Some(timestamp) = importer.parse_timestamp(ts_str) else {
                fail(&mut result, line, format!("could not parse timestamp: {}", ts_str));
                continue;
            };

            let value = match value_str.replace(',', ".").parse::<f64>() {
                Ok(v) => v,
                Err(_) => {
                    fail(&mut result, line, format!("not a number: {}", value_str));
                    continue;
                }
            };

            match normalize_glucose(value, importer.unit) {
                Ok(mg_dl) => {
                    result
                        .readings
                        .push(GlucoseReading::new(importer.patient_id.as_str(), timestamp, mg_dl));
                    result.rows_processed += 1;
                }
                Err(e) => fail(&mut result, line, e.to_string()),
            }
        }

        if result.errors.len() > MAX_REPORTED_ERRORS {
            let total = result.errors.len();
            result.errors.truncate(MAX_REPORTED_ERRORS);
            result
                .errors
                .push(format!("... and {} more errors", total - MAX_REPORTED_ERRORS));
        }

        result.readings.sort_by_key(|r| r.timestamp);

        tracing::debug!(
            patient_id = %importer.patient_id,
            rows = result.rows_processed,
            failed = result.rows_failed,
            "CSV parsed"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_import() {
        let csv_data = "timestamp,glucose
2024-01-15 08:00:00,110
2024-01-15 08:05:00,115
2024-01-15T08:10:00Z,121";

        let result = ReadingCsvImporter::new("P001").import_str(csv_data).unwrap();

        assert_eq!(result.rows_processed, 3);
        assert_eq!(result.rows_failed, 0);
        assert_eq!(result.readings[2].value, 121.0);
        assert_eq!(result.readings[0].patient_id, "P001");
    }

    #[test]
    fn test_bad_rows_reported() {
        let csv_data = "timestamp,glucose
2024-01-15 08:00:00,110
yesterday,115
2024-01-15 08:10:00,abc
2024-01-15 08:15:00,900
2024-01-15 08:20:00,";

        let result = ReadingCsvImporter::new("P001").import_str(csv_data).unwrap();

        assert_eq!(result.rows_processed, 1);
        assert_eq!(result.rows_failed, 3);
        assert!(result.errors[0].starts_with("Line 3:"));
        assert!(result.errors[2].contains("outside"));
    }

    #[test]
    fn test_detect_columns_and_mmol() {
        let csv_data = "Device,Sensor Glucose (mmol/L),Date Time
cgm,5.5,15/01/2024 08:00
cgm,\"6,1\",15/01/2024 08:05";

        let result = ReadingCsvImporter::new("P001")
            .detect_columns()
            .with_unit(GlucoseUnit::MmolL)
            .import_str(csv_data)
            .unwrap();

        assert_eq!(result.rows_processed, 2);
        assert!((result.readings[0].value - 99.1001).abs() < 1e-3);
        assert!((result.readings[1].value - 6.1 * 18.0182).abs() < 1e-9);
    }

    #[test]
    fn test_missing_header_column() {
        let err = ReadingCsvImporter::new("P001")
            .detect_columns()
            .import_str("when,what\n1,2")
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingColumn("glucose")));
    }

    #[test]
    fn test_epoch_and_custom_format() {
        let importer = ReadingCsvImporter::new("P001").with_timestamp_format("%d.%m.%Y %H:%M");
        let ts = importer.parse_timestamp("15.01.2024 08:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap());

        assert_eq!(importer.parse_timestamp("1705305600"), Some(ts));
        assert_eq!(importer.parse_timestamp("1705305600000"), Some(ts));
    }

    #[test]
    fn test_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.csv");
        std::fs::write(&path, "08:00,2024-01-15 08:00:00,130\n").unwrap();

        let result = ReadingCsvImporter::new("P001")
            .with_header(false)
            .with_timestamp_column(1)
            .with_value_column(2)
            .import(&path)
            .unwrap();
        assert_eq!(result.readings.len(), 1);
    }
}
