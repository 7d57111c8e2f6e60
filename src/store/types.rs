//! Persisted record types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analytics::{AnalyticsError, AnalyticsResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiabetesType {
    #[serde(rename = "Type 1")]
    Type1,
    #[serde(rename = "Type 2")]
    Type2,
}

impl DiabetesType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiabetesType::Type1 => "Type 1",
            DiabetesType::Type2 => "Type 2",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace(' ', "").as_str() {
            "type1" | "1" | "t1" => Some(DiabetesType::Type1),
            "type2" | "2" | "t2" => Some(DiabetesType::Type2),
            _ => None,
        }
    }
}

impl fmt::Display for DiabetesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub age: u8,
    pub diabetes_type: DiabetesType,
    pub diagnosis_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub current_cluster: Option<u8>,
    pub last_analysis_date: Option<DateTime<Utc>>,
}

/// Patient registration payload
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewPatient {
    pub id: String,
    pub name: String,
    pub age: u8,
    pub diabetes_type: DiabetesType,
    pub diagnosis_date: NaiveDate,
}

impl NewPatient {
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.id.trim().is_empty() {
            return Err(AnalyticsError::Validation("patient id must not be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(AnalyticsError::Validation("patient name must not be empty".to_string()));
        }
        if !(1..=120).contains(&self.age) {
            return Err(AnalyticsError::Validation(format!(
                "age must be between 1 and 120, got {}",
                self.age
            )));
        }
        Ok(())
    }
}

/// One row of a patient's cluster history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub patient_id: String,
    pub cluster_id: u8,
    pub cluster_name: String,
    pub confidence_score: f64,
    pub assigned_at: DateTime<Utc>,
    pub avg_tir: f64,
    pub avg_cv: f64,
    pub avg_gmi: f64,
}

/// A catalog food with nutrients per suggested amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub id: i64,
    pub category: String,
    pub name: String,
    pub base_dish: Option<String>,
    pub image: Option<String>,
    pub suggested_amount: f64,
    pub unit: String,
    pub gross_weight_g: f64,
    pub net_weight_g: f64,
    pub energy_kcal: f64,
    pub protein_g: f64,
    pub lipids_g: f64,
    pub carbohydrates_g: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodStats {
    pub total_categories: usize,
    /// Category name to food count, in catalog order
    pub categories: Vec<(String, usize)>,
    pub total_foods: usize,
}

/// A selected food for the carbohydrate calculator
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CarbSelection {
    pub category: String,
    pub id: i64,
    /// Multiples of the suggested amount
    #[serde(default = "default_servings")]
    pub servings: f64,
}

fn default_servings() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize)]
pub struct CarbLine {
    pub category: String,
    pub id: i64,
    pub name: String,
    pub servings: f64,
    pub carbohydrates_g: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CarbTotal {
    pub items: Vec<CarbLine>,
    /// Rounded to 2 decimals
    pub total_carbohydrates_g: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diabetes_type_serde() {
        let json = serde_json::to_string(&DiabetesType::Type1).unwrap();
        assert_eq!(json, "\"Type 1\"");
        let parsed: DiabetesType = serde_json::from_str("\"Type 2\"").unwrap();
        assert_eq!(parsed, DiabetesType::Type2);

        assert_eq!(DiabetesType::parse("type 1"), Some(DiabetesType::Type1));
        assert_eq!(DiabetesType::parse("T2"), Some(DiabetesType::Type2));
        assert_eq!(DiabetesType::parse("gestational"), None);
    }

    #[test]
    fn test_new_patient_validation() {
        let mut p = NewPatient {
            id: "P001".to_string(),
            name: "Ana".to_string(),
            age: 34,
            diabetes_type: DiabetesType::Type1,
            diagnosis_date: NaiveDate::from_ymd_opt(2015, 3, 1).unwrap(),
        };
        assert!(p.validate().is_ok());

        p.age = 0;
        assert!(p.validate().is_err());
        p.age = 121;
        assert!(p.validate().is_err());
        p.age = 120;
        p.id = "  ".to_string();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_carb_selection_default_servings() {
        let s: CarbSelection = serde_json::from_str(r#"{"category":"frutas","id":1}"#).unwrap();
        assert_eq!(s.servings, 1.0);
    }
}
