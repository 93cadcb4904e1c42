//! Medication lists, reconciliation and the administration record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TYPE_INPATIENT_ACTIVE: &str = "INPATIENT_ACTIVE";
pub const TYPE_HOME_MED: &str = "HOME_MED";
pub const STATUS_ACTIVE: &str = "Active";

/// `patient_medications` row joined with the recorder's username
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PatientMedication {
    pub id: String,
    pub patient_id: String,
    pub orderable_item_id: Option<String>,
    pub medication_name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub med_type: String,
    pub dose: Option<String>,
    pub route: Option<String>,
    pub frequency: Option<String>,
    pub prn_reason: Option<String>,
    pub indication: Option<String>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub status: String,
    pub source_of_information: Option<String>,
    pub last_taken_datetime: Option<DateTime<Utc>>,
    pub recorded_by_user_id: Option<i32>,
    pub recorded_by_username: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub source_order_id: Option<String>,
}

impl PatientMedication {
    pub fn is_home_med(&self) -> bool {
        self.med_type == TYPE_HOME_MED
    }
}

#[derive(Debug, Clone)]
pub struct NewPatientMedication {
    pub patient_id: String,
    pub orderable_item_id: Option<String>,
    pub medication_name: String,
    pub med_type: &'static str,
    pub dose: Option<String>,
    pub route: Option<String>,
    pub frequency: Option<String>,
    pub prn_reason: Option<String>,
    pub indication: Option<String>,
    pub start_datetime: DateTime<Utc>,
    pub source_of_information: Option<String>,
    pub last_taken_datetime: Option<DateTime<Utc>>,
    pub recorded_by_user_id: Option<i32>,
    pub source_order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReconciliationLog {
    pub id: String,
    pub patient_id: String,
    pub reconciliation_type: String,
    pub reconciled_by_user_id: i32,
    pub reconciled_by_username: Option<String>,
    pub reconciliation_datetime: DateTime<Utc>,
    pub decisions_log: Option<Value>,
    pub notes: Option<String>,
}

/// One entry on the medication administration record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MedicationAdministration {
    pub id: String,
    pub patient_id: String,
    pub patient_medication_id: String,
    pub medication_name: Option<String>,
    pub administered_by_user_id: i32,
    pub administered_by_username: Option<String>,
    pub administration_time: DateTime<Utc>,
    pub status: String,
    pub dose_given: Option<String>,
    pub notes: Option<String>,
}
