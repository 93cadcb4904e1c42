//! Provider schedule

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statuses that free the provider's time slot
pub const CANCELLED_STATUSES: [&str; 3] = ["CancelledByPatient", "CancelledByClinic", "NoShow"];
pub const STATUS_SCHEDULED: &str = "Scheduled";
pub const STATUS_CANCELLED_BY_CLINIC: &str = "CancelledByClinic";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub patient_mrn: Option<String>,
    pub provider_user_id: i32,
    pub provider_name: Option<String>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub appointment_type: Option<String>,
    pub status: String,
    pub location: Option<String>,
    pub reason_for_visit: Option<String>,
    pub notes: Option<String>,
    pub created_by_user_id: Option<i32>,
    pub created_by_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_cancelled(&self) -> bool {
        CANCELLED_STATUSES.contains(&self.status.as_str())
    }

    pub fn involves(&self, user_id: i32) -> bool {
        self.provider_user_id == user_id || self.created_by_user_id == Some(user_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: String,
    pub provider_user_id: i32,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub appointment_type: Option<String>,
    pub status: String,
    pub location: Option<String>,
    pub reason_for_visit: Option<String>,
    pub notes: Option<String>,
    pub created_by_user_id: i32,
}

/// Filters for the appointment list. `provider_user_id` is already scoped to
/// the caller when they cannot read other providers' schedules.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub patient_id: Option<String>,
    pub provider_user_id: Option<i32>,
    pub start_from: Option<DateTime<Utc>>,
    pub start_until: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub appointment_type: Option<String>,
}
