//! Aggregate queries for reports and the patient timeline

use crate::core::HmsResult;
use crate::database::PostgresManager;
use crate::models::insight::{
    AppointmentTally, LabTrendRow, MedicationUsageRow, ProviderAppointmentCount, StayInterval, TimelineOrder,
};
use chrono::{DateTime, NaiveDate, Utc};

impl PostgresManager {
    pub async fn timeline_orders(&self, patient_id: &str) -> HmsResult<Vec<TimelineOrder>> {
        let query = r#"
            SELECT o.id, oi.name AS item_name, o.status, o.priority, o.ordering_physician_id,
                   o.order_placed_at
            FROM orders o
            LEFT JOIN orderable_items oi ON oi.id = o.orderable_item_id
            WHERE o.patient_id = $1
        "#;
        let orders = sqlx::query_as::<_, TimelineOrder>(query)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// Patient counts per recorded gender
    pub async fn gender_distribution(&self) -> HmsResult<Vec<(Option<String>, i64)>> {
        let rows = sqlx::query_as("SELECT gender, COUNT(*) FROM patients GROUP BY gender ORDER BY gender")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn patient_birth_dates(&self) -> HmsResult<Vec<NaiveDate>> {
        let dates = sqlx::query_scalar("SELECT date_of_birth FROM patients")
            .fetch_all(&self.pool)
            .await?;
        Ok(dates)
    }

    pub async fn appointment_tallies(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        provider_user_id: Option<i32>,
        appointment_type: Option<&str>,
    ) -> HmsResult<Vec<AppointmentTally>> {
        let query = r#"
            SELECT status, appointment_type
            FROM appointments
            WHERE start_datetime >= $1 AND start_datetime <= $2
              AND ($3::int IS NULL OR provider_user_id = $3)
              AND ($4::text IS NULL OR appointment_type ILIKE '%' || $4 || '%')
        "#;
        let rows = sqlx::query_as::<_, AppointmentTally>(query)
            .bind(from)
            .bind(until)
            .bind(provider_user_id)
            .bind(appointment_type)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn appointments_per_provider(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        appointment_type: Option<&str>,
    ) -> HmsResult<Vec<ProviderAppointmentCount>> {
        let query = r#"
            SELECT a.provider_user_id, u.full_name, COUNT(a.id) AS count
            FROM appointments a
            JOIN users u ON u.id = a.provider_user_id
            WHERE a.start_datetime >= $1 AND a.start_datetime <= $2
              AND ($3::text IS NULL OR a.appointment_type ILIKE '%' || $3 || '%')
            GROUP BY a.provider_user_id, u.full_name
        "#;
        let rows = sqlx::query_as::<_, ProviderAppointmentCount>(query)
            .bind(from)
            .bind(until)
            .bind(appointment_type)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Daily aggregates over numeric lab values, oldest day first
    pub async fn lab_result_trend(
        &self,
        from: NaiveDate,
        until: NaiveDate,
        test_name: Option<&str>,
        patient_id: Option<&str>,
    ) -> HmsResult<Vec<LabTrendRow>> {
        let query = r#"
            SELECT (result_datetime AT TIME ZONE 'UTC')::date AS date,
                   AVG(value_numeric) AS avg_value,
                   MIN(value_numeric) AS min_value,
                   MAX(value_numeric) AS max_value,
                   COUNT(id) AS tests_count
            FROM lab_results
            WHERE (result_datetime AT TIME ZONE 'UTC')::date >= $1
              AND (result_datetime AT TIME ZONE 'UTC')::date <= $2
              AND value_numeric IS NOT NULL
              AND ($3::text IS NULL OR test_name ILIKE '%' || $3 || '%')
              AND ($4::text IS NULL OR patient_id = $4)
            GROUP BY 1
            ORDER BY 1
        "#;
        let rows = sqlx::query_as::<_, LabTrendRow>(query)
            .bind(from)
            .bind(until)
            .bind(test_name)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// MAR entries per medication and administration status
    pub async fn medication_usage(
        &self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> HmsResult<Vec<MedicationUsageRow>> {
        let query = r#"
            SELECT COALESCE(pm.medication_name, 'Unknown') AS medication_name,
                   ma.status, COUNT(ma.id) AS administrations
            FROM medication_administrations ma
            LEFT JOIN patient_medications pm ON pm.id = ma.patient_medication_id
            WHERE ($1::timestamptz IS NULL OR ma.administration_time >= $1)
              AND ($2::timestamptz IS NULL OR ma.administration_time <= $2)
            GROUP BY 1, 2
            ORDER BY 3 DESC, 1
        "#;
        let rows = sqlx::query_as::<_, MedicationUsageRow>(query)
            .bind(from)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Task counts per status for tasks created inside the window
    pub async fn task_status_counts(
        &self,
        from: NaiveDate,
        until: NaiveDate,
        assigned_to_user_id: Option<i32>,
    ) -> HmsResult<Vec<(String, i64)>> {
        let query = r#"
            SELECT status, COUNT(id)
            FROM tasks
            WHERE (created_at AT TIME ZONE 'UTC')::date >= $1
              AND (created_at AT TIME ZONE 'UTC')::date <= $2
              AND ($3::int IS NULL OR assigned_to_user_id = $3)
            GROUP BY status
        "#;
        let rows = sqlx::query_as(query)
            .bind(from)
            .bind(until)
            .bind(assigned_to_user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Admission/discharge pairs, optionally bounded on the discharge date
    pub async fn stay_intervals(
        &self,
        discharged_from: Option<NaiveDate>,
        discharged_until: Option<NaiveDate>,
    ) -> HmsResult<Vec<StayInterval>> {
        let query = r#"
            SELECT admission_date, discharge_date
            FROM patients
            WHERE admission_date IS NOT NULL
              AND discharge_date IS NOT NULL
              AND discharge_date >= admission_date
              AND ($1::date IS NULL OR (discharge_date AT TIME ZONE 'UTC')::date >= $1)
              AND ($2::date IS NULL OR (discharge_date AT TIME ZONE 'UTC')::date <= $2)
        "#;
        let rows = sqlx::query_as::<_, StayInterval>(query)
            .bind(discharged_from)
            .bind(discharged_until)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
