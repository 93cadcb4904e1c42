//! Provider appointments

use crate::core::{HmsError, HmsResult, Page, Pagination};
use crate::database::PostgresManager;
use crate::models::appointment::CANCELLED_STATUSES;
use crate::models::{Appointment, AppointmentFilter, NewAppointment};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const APPOINTMENT_SELECT: &str = r#"
    SELECT a.id, a.patient_id, p.first_name || ' ' || p.last_name AS patient_name,
           p.mrn AS patient_mrn, a.provider_user_id, pr.full_name AS provider_name,
           a.start_datetime, a.end_datetime, a.appointment_type, a.status, a.location,
           a.reason_for_visit, a.notes, a.created_by_user_id,
           cb.username AS created_by_username, a.created_at, a.updated_at
    FROM appointments a
    LEFT JOIN patients p ON p.id = a.patient_id
    LEFT JOIN users pr ON pr.id = a.provider_user_id
    LEFT JOIN users cb ON cb.id = a.created_by_user_id
"#;

const APPOINTMENT_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR a.patient_id = $1)
      AND ($2::int IS NULL OR a.provider_user_id = $2)
      AND ($3::timestamptz IS NULL OR a.start_datetime >= $3)
      AND ($4::timestamptz IS NULL OR a.start_datetime <= $4)
      AND ($5::text IS NULL OR a.status ILIKE '%' || $5 || '%')
      AND ($6::text IS NULL OR a.appointment_type ILIKE '%' || $6 || '%')
"#;

impl PostgresManager {
    pub async fn insert_appointment(&self, appointment: &NewAppointment) -> HmsResult<Appointment> {
        let id = Uuid::new_v4().to_string();
        let query = r#"
            INSERT INTO appointments (
                id, patient_id, provider_user_id, start_datetime, end_datetime, appointment_type,
                status, location, reason_for_visit, notes, created_by_user_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#;
        sqlx::query(query)
            .bind(&id)
            .bind(&appointment.patient_id)
            .bind(appointment.provider_user_id)
            .bind(appointment.start_datetime)
            .bind(appointment.end_datetime)
            .bind(&appointment.appointment_type)
            .bind(&appointment.status)
            .bind(&appointment.location)
            .bind(&appointment.reason_for_visit)
            .bind(&appointment.notes)
            .bind(appointment.created_by_user_id)
            .execute(&self.pool)
            .await?;

        self.find_appointment(&id)
            .await?
            .ok_or_else(|| HmsError::not_found("Appointment"))
    }

    pub async fn find_appointment(&self, appointment_id: &str) -> HmsResult<Option<Appointment>> {
        let appointment =
            sqlx::query_as::<_, Appointment>(&format!("{} WHERE a.id = $1", APPOINTMENT_SELECT))
                .bind(appointment_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(appointment)
    }

    pub async fn save_appointment(&self, appointment: &Appointment) -> HmsResult<Appointment> {
        let query = r#"
            UPDATE appointments SET
                provider_user_id = $2, start_datetime = $3, end_datetime = $4,
                appointment_type = $5, status = $6, location = $7, reason_for_visit = $8,
                notes = $9, updated_at = NOW()
            WHERE id = $1
        "#;
        sqlx::query(query)
            .bind(&appointment.id)
            .bind(appointment.provider_user_id)
            .bind(appointment.start_datetime)
            .bind(appointment.end_datetime)
            .bind(&appointment.appointment_type)
            .bind(&appointment.status)
            .bind(&appointment.location)
            .bind(&appointment.reason_for_visit)
            .bind(&appointment.notes)
            .execute(&self.pool)
            .await?;

        self.find_appointment(&appointment.id)
            .await?
            .ok_or_else(|| HmsError::not_found("Appointment"))
    }

    /// Earliest first
    pub async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
        pagination: Pagination,
    ) -> HmsResult<Page<Appointment>> {
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM appointments a {}",
            APPOINTMENT_FILTER
        ))
        .bind(&filter.patient_id)
        .bind(filter.provider_user_id)
        .bind(filter.start_from)
        .bind(filter.start_until)
        .bind(&filter.status)
        .bind(&filter.appointment_type)
        .fetch_one(&self.pool)
        .await?;

        let query = format!(
            "{} {} ORDER BY a.start_datetime ASC LIMIT $7 OFFSET $8",
            APPOINTMENT_SELECT, APPOINTMENT_FILTER
        );
        let appointments = sqlx::query_as::<_, Appointment>(&query)
            .bind(&filter.patient_id)
            .bind(filter.provider_user_id)
            .bind(filter.start_from)
            .bind(filter.start_until)
            .bind(&filter.status)
            .bind(&filter.appointment_type)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(appointments, total, pagination))
    }

    /// First live appointment of the provider that overlaps `[start, end)`
    pub async fn find_conflicting_appointment(
        &self,
        provider_user_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> HmsResult<Option<String>> {
        let cancelled: Vec<String> = CANCELLED_STATUSES.iter().map(|s| s.to_string()).collect();
        let query = r#"
            SELECT id FROM appointments
            WHERE provider_user_id = $1
              AND status <> ALL($2)
              AND start_datetime < $4
              AND end_datetime > $3
              AND ($5::text IS NULL OR id <> $5)
            ORDER BY start_datetime
            LIMIT 1
        "#;
        let conflict = sqlx::query_scalar(query)
            .bind(provider_user_id)
            .bind(&cancelled)
            .bind(start)
            .bind(end)
            .bind(exclude_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(conflict)
    }

    pub async fn upcoming_appointments(
        &self,
        provider_user_id: i32,
        from: DateTime<Utc>,
        limit: i64,
    ) -> HmsResult<Vec<Appointment>> {
        let query = format!(
            "{} WHERE a.provider_user_id = $1 AND a.start_datetime >= $2 ORDER BY a.start_datetime ASC LIMIT $3",
            APPOINTMENT_SELECT
        );
        let appointments = sqlx::query_as::<_, Appointment>(&query)
            .bind(provider_user_id)
            .bind(from)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(appointments)
    }
}
