//! Vital sign observations

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Everything a nurse can chart in one observation
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct VitalMeasurements {
    pub temperature_celsius: Option<f64>,
    pub heart_rate_bpm: Option<i32>,
    pub respiratory_rate_rpm: Option<i32>,
    pub systolic_bp_mmhg: Option<i32>,
    pub diastolic_bp_mmhg: Option<i32>,
    pub oxygen_saturation_percent: Option<f64>,
    pub pain_score_0_10: Option<i32>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub blood_glucose_mg_dl: Option<i32>,
    pub blood_glucose_mmol_l: Option<f64>,
    pub blood_glucose_type: Option<String>,
    pub consciousness_level: Option<String>,
    pub patient_position: Option<String>,
    pub activity_level: Option<String>,
    pub o2_therapy_device: Option<String>,
    pub o2_flow_rate_lpm: Option<f64>,
    pub fio2_percent: Option<f64>,
    pub troponin_ng_l: Option<f64>,
    pub creatinine_umol_l: Option<f64>,
    pub ecg_changes: Option<String>,
    pub notes: Option<String>,
}

/// Patient history the cardiac risk scores need
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct RiskProfile {
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub congestive_heart_failure: bool,
    pub hypertension: bool,
    pub diabetes: bool,
    pub stroke_or_tia: bool,
    pub vascular_disease: bool,
    pub known_cad: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VitalSign {
    pub id: String,
    pub patient_id: String,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by_user_id: Option<i32>,
    pub recorded_by_username: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub measurements: VitalMeasurements,
    pub updated_at: DateTime<Utc>,
    #[sqlx(flatten)]
    #[serde(skip)]
    pub risk: RiskProfile,
}
