//! Glucose units
//!
//! The analytics core works in mg/dL. Values submitted in mmol/L are
//! converted once at the boundary.

use serde::{Deserialize, Serialize};

use super::error::{AnalyticsError, AnalyticsResult};

/// mg/dL per mmol/L for glucose
pub const MGDL_PER_MMOLL: f64 = 18.0182;

/// Lowest glucose value accepted from a sensor or meter (mg/dL)
pub const MIN_GLUCOSE_MGDL: f64 = 20.0;

/// Highest glucose value accepted from a sensor or meter (mg/dL)
pub const MAX_GLUCOSE_MGDL: f64 = 600.0;

/// Unit a glucose value was submitted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GlucoseUnit {
    #[serde(rename = "mg/dL")]
    #[default]
    MgDl,
    #[serde(rename = "mmol/L")]
    MmolL,
}

impl GlucoseUnit {
    /// Convert a value in this unit to mg/dL
    pub fn to_mg_dl(self, value: f64) -> f64 {
        match self {
            GlucoseUnit::MgDl => value,
            GlucoseUnit::MmolL => value * MGDL_PER_MMOLL,
        }
    }

    /// Convert a mg/dL value into this unit
    pub fn from_mg_dl(self, value: f64) -> f64 {
        match self {
            GlucoseUnit::MgDl => value,
            GlucoseUnit::MmolL => value / MGDL_PER_MMOLL,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GlucoseUnit::MgDl => "mg/dL",
            GlucoseUnit::MmolL => "mmol/L",
        }
    }

    /// Parse a user supplied unit label ("mgdl", "mg/dL", "mmol", ...)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('/', "").replace(' ', "").as_str() {
            "mgdl" | "mg" => Some(GlucoseUnit::MgDl),
            "mmoll" | "mmol" => Some(GlucoseUnit::MmolL),
            _ => None,
        }
    }
}

/// Convert a submitted value to mg/dL and check it is physiologically plausible
pub fn normalize_glucose(value: f64, unit: GlucoseUnit) -> AnalyticsResult<f64> {
    if !value.is_finite() {
        return Err(AnalyticsError::Validation(format!(
            "glucose value {} is not a number",
            value
        )));
    }

    let mg_dl = unit.to_mg_dl(value);
    if !(MIN_GLUCOSE_MGDL..=MAX_GLUCOSE_MGDL).contains(&mg_dl) {
        return Err(AnalyticsError::Validation(format!(
            "glucose value {} {} is outside {}-{} mg/dL",
            value,
            unit.label(),
            MIN_GLUCOSE_MGDL,
            MAX_GLUCOSE_MGDL
        )));
    }

    Ok(mg_dl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mmol_conversion() {
        let mg = GlucoseUnit::MmolL.to_mg_dl(5.5);
        assert!((mg - 99.1001).abs() < 1e-4);
        assert!((GlucoseUnit::MmolL.from_mg_dl(mg) - 5.5).abs() < 1e-12);
        assert_eq!(GlucoseUnit::MgDl.to_mg_dl(120.0), 120.0);
    }

    #[test]
    fn test_parse_unit() {
        assert_eq!(GlucoseUnit::parse("mg/dL"), Some(GlucoseUnit::MgDl));
        assert_eq!(GlucoseUnit::parse("MMOL/L"), Some(GlucoseUnit::MmolL));
        assert_eq!(GlucoseUnit::parse("mmol"), Some(GlucoseUnit::MmolL));
        assert_eq!(GlucoseUnit::parse("grains"), None);
    }

    #[test]
    fn test_normalize_bounds() {
        assert_eq!(normalize_glucose(20.0, GlucoseUnit::MgDl).unwrap(), 20.0);
        assert_eq!(normalize_glucose(600.0, GlucoseUnit::MgDl).unwrap(), 600.0);
        assert!(normalize_glucose(19.9, GlucoseUnit::MgDl).is_err());
        assert!(normalize_glucose(601.0, GlucoseUnit::MgDl).is_err());
        assert!(normalize_glucose(f64::NAN, GlucoseUnit::MgDl).is_err());

        // 2.0 mmol/L is ~36 mg/dL, 25.0 mmol/L is ~450 mg/dL
        assert!(normalize_glucose(2.0, GlucoseUnit::MmolL).is_ok());
        assert!(normalize_glucose(25.0, GlucoseUnit::MmolL).is_ok());
        assert!(normalize_glucose(40.0, GlucoseUnit::MmolL).is_err());
    }

    #[test]
    fn test_unit_serde_labels() {
        let json = serde_json::to_string(&GlucoseUnit::MmolL).unwrap();
        assert_eq!(json, "\"mmol/L\"");
        let unit: GlucoseUnit = serde_json::from_str("\"mg/dL\"").unwrap();
        assert_eq!(unit, GlucoseUnit::MgDl);
    }
}
