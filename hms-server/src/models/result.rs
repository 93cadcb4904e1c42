//! Lab results and imaging reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Abnormal flags that page the attending physician
pub const CRITICAL_FLAGS: [&str; 3] = ["Critical", "HH", "LL"];

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LabResult {
    pub id: String,
    pub patient_id: String,
    pub ordered_test_id: Option<String>,
    pub test_name: String,
    pub panel_name: Option<String>,
    pub value: Option<String>,
    pub value_numeric: Option<f64>,
    pub units: Option<String>,
    pub reference_range: Option<String>,
    pub abnormal_flag: Option<String>,
    pub status: String,
    pub collection_datetime: DateTime<Utc>,
    pub result_datetime: DateTime<Utc>,
    pub performing_lab: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by_user_id: Option<i32>,
    pub acknowledged_by_username: Option<String>,
}

impl LabResult {
    pub fn is_critical(&self) -> bool {
        self.abnormal_flag
            .as_deref()
            .map(|flag| CRITICAL_FLAGS.contains(&flag))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct NewLabResult {
    pub patient_id: String,
    pub ordered_test_id: Option<String>,
    pub test_name: String,
    pub panel_name: Option<String>,
    pub value: String,
    pub value_numeric: Option<f64>,
    pub units: Option<String>,
    pub reference_range: Option<String>,
    pub abnormal_flag: Option<String>,
    pub status: String,
    pub collection_datetime: DateTime<Utc>,
    pub performing_lab: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImagingReport {
    pub id: String,
    pub patient_id: String,
    pub ordered_study_id: Option<String>,
    pub modality: String,
    pub study_description: String,
    pub study_datetime: DateTime<Utc>,
    pub report_text: Option<String>,
    pub impression_text: Option<String>,
    pub status: String,
    pub reported_by_user_id: Option<i32>,
    pub reported_by_username: Option<String>,
    pub report_datetime: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by_user_id: Option<i32>,
    pub acknowledged_by_username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewImagingReport {
    pub patient_id: String,
    pub ordered_study_id: Option<String>,
    pub modality: String,
    pub study_description: String,
    pub study_datetime: DateTime<Utc>,
    pub report_text: String,
    pub impression_text: Option<String>,
    pub status: String,
    pub reported_by_user_id: i32,
}

/// Parse a lab value as a number when it looks like one (`"7.4"`, `"-2"`, `12`)
pub fn numeric_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => {
            let digits = s.strip_prefix('-').unwrap_or(s);
            let mut parts = digits.splitn(2, '.');
            let whole = parts.next().unwrap_or("");
            let frac = parts.next().unwrap_or("");
            let looks_numeric = !(whole.is_empty() && frac.is_empty())
                && whole.chars().all(|c| c.is_ascii_digit())
                && frac.chars().all(|c| c.is_ascii_digit());
            if looks_numeric {
                s.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_values_are_detected() {
        assert_eq!(numeric_value(&json!(7.4)), Some(7.4));
        assert_eq!(numeric_value(&json!("140")), Some(140.0));
        assert_eq!(numeric_value(&json!("-2.5")), Some(-2.5));
        assert_eq!(numeric_value(&json!("Positive")), None);
        assert_eq!(numeric_value(&json!("1.2.3")), None);
        assert_eq!(numeric_value(&json!("")), None);
    }
}
