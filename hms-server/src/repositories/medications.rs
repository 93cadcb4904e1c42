//! Patient medication lists, reconciliation logs and the MAR

use crate::core::{HmsResult, Page, Pagination};
use crate::database::PostgresManager;
use crate::models::medication::{STATUS_ACTIVE, TYPE_INPATIENT_ACTIVE};
use crate::models::{MedicationAdministration, NewPatientMedication, PatientMedication, ReconciliationLog};
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

const MEDICATION_SELECT: &str = r#"
    SELECT pm.id, pm.patient_id, pm.orderable_item_id, pm.medication_name, pm.type,
           pm.dose, pm.route, pm.frequency, pm.prn_reason, pm.indication,
           pm.start_datetime, pm.end_datetime, pm.status, pm.source_of_information,
           pm.last_taken_datetime, pm.recorded_by_user_id, u.username AS recorded_by_username,
           pm.recorded_at, pm.source_order_id
    FROM patient_medications pm
    LEFT JOIN users u ON u.id = pm.recorded_by_user_id
"#;

const ADMINISTRATION_SELECT: &str = r#"
    SELECT ma.id, ma.patient_id, ma.patient_medication_id, pm.medication_name,
           ma.administered_by_user_id, u.username AS administered_by_username,
           ma.administration_time, ma.status, ma.dose_given, ma.notes
    FROM medication_administrations ma
    LEFT JOIN patient_medications pm ON pm.id = ma.patient_medication_id
    LEFT JOIN users u ON u.id = ma.administered_by_user_id
"#;

impl PostgresManager {
    /// `status = None` lists every status
    pub async fn list_patient_medications(
        &self,
        patient_id: &str,
        med_type: Option<&str>,
        status: Option<&str>,
        pagination: Pagination,
    ) -> HmsResult<Page<PatientMedication>> {
        let filter = r#"
            WHERE pm.patient_id = $1
              AND ($2::text IS NULL OR pm.type ILIKE '%' || $2 || '%')
              AND ($3::text IS NULL OR pm.status ILIKE '%' || $3 || '%')
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM patient_medications pm {}",
            filter
        ))
        .bind(patient_id)
        .bind(med_type)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let query = format!(
            "{} {} ORDER BY pm.start_datetime DESC LIMIT $4 OFFSET $5",
            MEDICATION_SELECT, filter
        );
        let medications = sqlx::query_as::<_, PatientMedication>(&query)
            .bind(patient_id)
            .bind(med_type)
            .bind(status)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(medications, total, pagination))
    }

    pub async fn find_patient_medication(&self, medication_id: &str) -> HmsResult<Option<PatientMedication>> {
        let query = format!("{} WHERE pm.id = $1", MEDICATION_SELECT);
        let medication = sqlx::query_as::<_, PatientMedication>(&query)
            .bind(medication_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(medication)
    }

    pub async fn insert_patient_medication(&self, medication: &NewPatientMedication) -> HmsResult<PatientMedication> {
        let id = Uuid::new_v4().to_string();
        let query = r#"
            INSERT INTO patient_medications (
                id, patient_id, orderable_item_id, medication_name, type, dose, route, frequency,
                prn_reason, indication, start_datetime, status, source_of_information,
                last_taken_datetime, recorded_by_user_id, source_order_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'Active', $12, $13, $14, $15)
        "#;
        sqlx::query(query)
            .bind(&id)
            .bind(&medication.patient_id)
            .bind(&medication.orderable_item_id)
            .bind(&medication.medication_name)
            .bind(medication.med_type)
            .bind(&medication.dose)
            .bind(&medication.route)
            .bind(&medication.frequency)
            .bind(&medication.prn_reason)
            .bind(&medication.indication)
            .bind(medication.start_datetime)
            .bind(&medication.source_of_information)
            .bind(medication.last_taken_datetime)
            .bind(medication.recorded_by_user_id)
            .bind(&medication.source_order_id)
            .execute(&self.pool)
            .await?;

        self.find_patient_medication(&id)
            .await?
            .ok_or_else(|| crate::core::HmsError::not_found("PatientMedication"))
    }

    pub async fn save_patient_medication(&self, medication: &PatientMedication) -> HmsResult<()> {
        let query = r#"
            UPDATE patient_medications SET
                medication_name = $2, dose = $3, route = $4, frequency = $5, indication = $6,
                status = $7, prn_reason = $8, source_of_information = $9, start_datetime = $10,
                end_datetime = $11, last_taken_datetime = $12
            WHERE id = $1
        "#;
        sqlx::query(query)
            .bind(&medication.id)
            .bind(&medication.medication_name)
            .bind(&medication.dose)
            .bind(&medication.route)
            .bind(&medication.frequency)
            .bind(&medication.indication)
            .bind(&medication.status)
            .bind(&medication.prn_reason)
            .bind(&medication.source_of_information)
            .bind(medication.start_datetime)
            .bind(medication.end_datetime)
            .bind(medication.last_taken_datetime)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_reconciliation_log(
        &self,
        patient_id: &str,
        reconciliation_type: &str,
        user_id: i32,
        decisions_log: &Value,
        notes: Option<&str>,
    ) -> HmsResult<String> {
        let id = Uuid::new_v4().to_string();
        let query = r#"
            INSERT INTO medication_reconciliation_logs (
                id, patient_id, reconciliation_type, reconciled_by_user_id, decisions_log, notes
            ) VALUES ($1, $2, $3, $4, $5, $6)
        "#;
        sqlx::query(query)
            .bind(&id)
            .bind(patient_id)
            .bind(reconciliation_type)
            .bind(user_id)
            .bind(decisions_log)
            .bind(notes)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn list_reconciliation_logs(&self, patient_id: &str) -> HmsResult<Vec<ReconciliationLog>> {
        let query = r#"
            SELECT l.id, l.patient_id, l.reconciliation_type, l.reconciled_by_user_id,
                   u.username AS reconciled_by_username, l.reconciliation_datetime,
                   l.decisions_log, l.notes
            FROM medication_reconciliation_logs l
            LEFT JOIN users u ON u.id = l.reconciled_by_user_id
            WHERE l.patient_id = $1
            ORDER BY l.reconciliation_datetime DESC
        "#;
        let logs = sqlx::query_as::<_, ReconciliationLog>(query)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(logs)
    }

    pub async fn insert_administration(
        &self,
        medication: &PatientMedication,
        administered_by_user_id: i32,
        administration_time: DateTime<Utc>,
        status: &str,
        dose_given: Option<&str>,
        notes: Option<&str>,
    ) -> HmsResult<MedicationAdministration> {
        let id = Uuid::new_v4().to_string();
        let query = r#"
            INSERT INTO medication_administrations (
                id, patient_id, patient_medication_id, administered_by_user_id,
                administration_time, status, dose_given, notes
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#;
        sqlx::query(query)
            .bind(&id)
            .bind(&medication.patient_id)
            .bind(&medication.id)
            .bind(administered_by_user_id)
            .bind(administration_time)
            .bind(status)
            .bind(dose_given)
            .bind(notes)
            .execute(&self.pool)
            .await?;

        let record = sqlx::query_as::<_, MedicationAdministration>(&format!(
            "{} WHERE ma.id = $1",
            ADMINISTRATION_SELECT
        ))
        .bind(&id)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn list_administrations(
        &self,
        patient_id: &str,
        pagination: Pagination,
    ) -> HmsResult<Page<MedicationAdministration>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM medication_administrations WHERE patient_id = $1")
                .bind(patient_id)
                .fetch_one(&self.pool)
                .await?;

        let query = format!(
            "{} WHERE ma.patient_id = $1 ORDER BY ma.administration_time DESC LIMIT $2 OFFSET $3",
            ADMINISTRATION_SELECT
        );
        let records = sqlx::query_as::<_, MedicationAdministration>(&query)
            .bind(patient_id)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(records, total, pagination))
    }

    /// Active inpatient medications for patients under the given attending physician
    pub async fn active_inpatient_medications_for_attending(
        &self,
        physician_id: i32,
        limit: i64,
    ) -> HmsResult<Vec<PatientMedication>> {
        let query = format!(
            r#"{}
            JOIN patients p ON p.id = pm.patient_id
            WHERE p.attending_physician_id = $1 AND pm.status = $2 AND pm.type = $3
            ORDER BY pm.recorded_at DESC
            LIMIT $4"#,
            MEDICATION_SELECT
        );
        let medications = sqlx::query_as::<_, PatientMedication>(&query)
            .bind(physician_id)
            .bind(STATUS_ACTIVE)
            .bind(TYPE_INPATIENT_ACTIVE)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(medications)
    }

    /// Every MAR entry for the patient, unordered
    pub async fn all_administrations(&self, patient_id: &str) -> HmsResult<Vec<MedicationAdministration>> {
        let query = format!("{} WHERE ma.patient_id = $1", ADMINISTRATION_SELECT);
        let entries = sqlx::query_as::<_, MedicationAdministration>(&query)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }
}
