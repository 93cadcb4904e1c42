//! Patients, allergies, problem list and clinical notes

use crate::core::HmsResult;
use crate::database::PostgresManager;
use crate::models::{ClinicalNote, NewPatient, Patient, PatientAllergy, ProblemListEntry};
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

const PATIENT_COLUMNS: &str = r#"
    id, mrn, first_name, last_name, date_of_birth, gender, attending_physician_id,
    code_status, isolation_precautions, admission_date, discharge_date, known_cad,
    congestive_heart_failure, hypertension, diabetes, stroke_or_tia, vascular_disease,
    atrial_fibrillation, created_at, updated_at
"#;

const NOTE_COLUMNS: &str = r#"
    id, patient_id, author_user_id, note_type, service_specialty, title, content_text,
    status, signed_at, signed_by_user_id, created_at, updated_at
"#;

impl PostgresManager {
    pub async fn find_patient(&self, patient_id: &str) -> HmsResult<Option<Patient>> {
        let query = format!("SELECT {} FROM patients WHERE id = $1", PATIENT_COLUMNS);
        let patient = sqlx::query_as::<_, Patient>(&query)
            .bind(patient_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(patient)
    }

    /// Look a patient up by MRN first, then by id
    pub async fn find_patient_by_identifier(&self, identifier: &str) -> HmsResult<Option<Patient>> {
        let query = format!(
            "SELECT {} FROM patients WHERE mrn = $1 OR id = $1 ORDER BY (mrn = $1) DESC LIMIT 1",
            PATIENT_COLUMNS
        );
        let patient = sqlx::query_as::<_, Patient>(&query)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;
        Ok(patient)
    }

    pub async fn patient_exists(&self, patient_id: &str) -> HmsResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM patients WHERE id = $1)")
            .bind(patient_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    pub async fn mrn_exists(&self, mrn: &str) -> HmsResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM patients WHERE mrn = $1)")
            .bind(mrn)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    pub async fn insert_patient(&self, patient: &NewPatient) -> HmsResult<Patient> {
        let query = format!(
            r#"
            INSERT INTO patients (
                id, mrn, first_name, last_name, date_of_birth, gender, attending_physician_id,
                code_status, isolation_precautions, admission_date, known_cad,
                congestive_heart_failure, hypertension, diabetes, stroke_or_tia,
                vascular_disease, atrial_fibrillation
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {}
            "#,
            PATIENT_COLUMNS
        );
        let created = sqlx::query_as::<_, Patient>(&query)
            .bind(Uuid::new_v4().to_string())
            .bind(&patient.mrn)
            .bind(&patient.first_name)
            .bind(&patient.last_name)
            .bind(patient.date_of_birth)
            .bind(&patient.gender)
            .bind(patient.attending_physician_id)
            .bind(&patient.code_status)
            .bind(&patient.isolation_precautions)
            .bind(patient.admission_date)
            .bind(patient.known_cad)
            .bind(patient.congestive_heart_failure)
            .bind(patient.hypertension)
            .bind(patient.diabetes)
            .bind(patient.stroke_or_tia)
            .bind(patient.vascular_disease)
            .bind(patient.atrial_fibrillation)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    /// Persist every mutable column of an already-loaded patient
    pub async fn save_patient(&self, patient: &Patient) -> HmsResult<Patient> {
        let query = format!(
            r#"
            UPDATE patients SET
                mrn = $2, first_name = $3, last_name = $4, date_of_birth = $5, gender = $6,
                attending_physician_id = $7, code_status = $8, isolation_precautions = $9,
                admission_date = $10, discharge_date = $11, known_cad = $12,
                congestive_heart_failure = $13, hypertension = $14, diabetes = $15,
                stroke_or_tia = $16, vascular_disease = $17, atrial_fibrillation = $18,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PATIENT_COLUMNS
        );
        let saved = sqlx::query_as::<_, Patient>(&query)
            .bind(&patient.id)
            .bind(&patient.mrn)
            .bind(&patient.first_name)
            .bind(&patient.last_name)
            .bind(patient.date_of_birth)
            .bind(&patient.gender)
            .bind(patient.attending_physician_id)
            .bind(&patient.code_status)
            .bind(&patient.isolation_precautions)
            .bind(patient.admission_date)
            .bind(patient.discharge_date)
            .bind(patient.known_cad)
            .bind(patient.congestive_heart_failure)
            .bind(patient.hypertension)
            .bind(patient.diabetes)
            .bind(patient.stroke_or_tia)
            .bind(patient.vascular_disease)
            .bind(patient.atrial_fibrillation)
            .fetch_one(&self.pool)
            .await?;
        Ok(saved)
    }

    /// Names of active allergies, oldest first
    pub async fn active_allergen_names(&self, patient_id: &str) -> HmsResult<Vec<String>> {
        let query = r#"
            SELECT allergen_name FROM patient_allergies
            WHERE patient_id = $1 AND is_active = TRUE
            ORDER BY recorded_at, allergen_name
        "#;
        let names = sqlx::query_scalar(query)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    pub async fn list_allergies(&self, patient_id: &str) -> HmsResult<Vec<PatientAllergy>> {
        let query = r#"
            SELECT id, patient_id, allergen_name, reaction_description, severity,
                   recorded_at, recorded_by_user_id, is_active
            FROM patient_allergies
            WHERE patient_id = $1
            ORDER BY is_active DESC, recorded_at DESC
        "#;
        let allergies = sqlx::query_as::<_, PatientAllergy>(query)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(allergies)
    }

    pub async fn insert_allergy(
        &self,
        patient_id: &str,
        allergen_name: &str,
        reaction_description: Option<&str>,
        severity: &str,
        recorded_by_user_id: i32,
    ) -> HmsResult<PatientAllergy> {
        let query = r#"
            INSERT INTO patient_allergies (
                id, patient_id, allergen_name, reaction_description, severity, recorded_by_user_id
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, patient_id, allergen_name, reaction_description, severity,
                      recorded_at, recorded_by_user_id, is_active
        "#;
        let allergy = sqlx::query_as::<_, PatientAllergy>(query)
            .bind(Uuid::new_v4().to_string())
            .bind(patient_id)
            .bind(allergen_name)
            .bind(reaction_description)
            .bind(severity)
            .bind(recorded_by_user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(allergy)
    }

    pub async fn list_problems(&self, patient_id: &str) -> HmsResult<Vec<ProblemListEntry>> {
        let query = r#"
            SELECT id, patient_id, icd10_code, problem_description, onset_date, status,
                   recorded_by_user_id, recorded_at
            FROM patient_problem_list
            WHERE patient_id = $1
            ORDER BY recorded_at DESC
        "#;
        let problems = sqlx::query_as::<_, ProblemListEntry>(query)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(problems)
    }

    pub async fn insert_problem(
        &self,
        patient_id: &str,
        icd10_code: Option<&str>,
        problem_description: &str,
        onset_date: Option<NaiveDate>,
        status: &str,
        recorded_by_user_id: i32,
    ) -> HmsResult<ProblemListEntry> {
        let query = r#"
            INSERT INTO patient_problem_list (
                id, patient_id, icd10_code, problem_description, onset_date, status, recorded_by_user_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, patient_id, icd10_code, problem_description, onset_date, status,
                      recorded_by_user_id, recorded_at
        "#;
        let problem = sqlx::query_as::<_, ProblemListEntry>(query)
            .bind(Uuid::new_v4().to_string())
            .bind(patient_id)
            .bind(icd10_code)
            .bind(problem_description)
            .bind(onset_date)
            .bind(status)
            .bind(recorded_by_user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(problem)
    }

    pub async fn insert_note(
        &self,
        patient_id: &str,
        author_user_id: i32,
        note_type: &str,
        title: Option<&str>,
        service_specialty: Option<&str>,
        content_text: &str,
    ) -> HmsResult<ClinicalNote> {
        let query = format!(
            r#"
            INSERT INTO clinical_notes (
                id, patient_id, author_user_id, note_type, title, service_specialty, content_text, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'Draft')
            RETURNING {}
            "#,
            NOTE_COLUMNS
        );
        let note = sqlx::query_as::<_, ClinicalNote>(&query)
            .bind(Uuid::new_v4().to_string())
            .bind(patient_id)
            .bind(author_user_id)
            .bind(note_type)
            .bind(title)
            .bind(service_specialty)
            .bind(content_text)
            .fetch_one(&self.pool)
            .await?;
        Ok(note)
    }

    pub async fn list_notes(&self, patient_id: &str) -> HmsResult<Vec<ClinicalNote>> {
        let query = format!(
            "SELECT {} FROM clinical_notes WHERE patient_id = $1 ORDER BY created_at DESC",
            NOTE_COLUMNS
        );
        let notes = sqlx::query_as::<_, ClinicalNote>(&query)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(notes)
    }

    pub async fn find_note(&self, note_id: &str) -> HmsResult<Option<ClinicalNote>> {
        let query = format!("SELECT {} FROM clinical_notes WHERE id = $1", NOTE_COLUMNS);
        let note = sqlx::query_as::<_, ClinicalNote>(&query)
            .bind(note_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(note)
    }

    pub async fn sign_note(&self, note_id: &str, signer_id: i32) -> HmsResult<()> {
        let query = r#"
            UPDATE clinical_notes
            SET status = 'Final', signed_at = $2, signed_by_user_id = $3, updated_at = NOW()
            WHERE id = $1
        "#;
        sqlx::query(query)
            .bind(note_id)
            .bind(Utc::now())
            .bind(signer_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn patients_attended_by(&self, physician_id: i32) -> HmsResult<Vec<Patient>> {
        let query = format!(
            "SELECT {} FROM patients WHERE attending_physician_id = $1 ORDER BY last_name, first_name",
            PATIENT_COLUMNS
        );
        let patients = sqlx::query_as::<_, Patient>(&query)
            .bind(physician_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(patients)
    }
}
