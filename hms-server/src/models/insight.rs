//! Read-only rows backing the dashboard, timeline and reports

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Order joined with its catalog name, as shown on the patient timeline
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TimelineOrder {
    pub id: String,
    pub item_name: Option<String>,
    pub status: String,
    pub priority: String,
    pub ordering_physician_id: i32,
    pub order_placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppointmentTally {
    pub status: String,
    pub appointment_type: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProviderAppointmentCount {
    pub provider_user_id: i32,
    pub full_name: Option<String>,
    pub count: i64,
}

/// One day of numeric lab values
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LabTrendRow {
    pub date: NaiveDate,
    pub avg_value: Option<f64>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub tests_count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MedicationUsageRow {
    pub medication_name: String,
    pub status: String,
    pub administrations: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StayInterval {
    pub admission_date: DateTime<Utc>,
    pub discharge_date: DateTime<Utc>,
}
