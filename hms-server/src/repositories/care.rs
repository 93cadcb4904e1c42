//! Rounding notes, shift handoffs, patient flags and discharge plans

use crate::core::{HmsError, HmsResult, Page, Pagination};
use crate::database::PostgresManager;
use crate::models::{DischargePlan, HandoffEntry, PatientFlag, RoundingNote};
use chrono::{DateTime, Utc};

const ROUNDING_SELECT: &str = r#"
    SELECT r.id, r.patient_id, p.first_name || ' ' || p.last_name AS patient_name,
           r.rounding_physician_id, rp.username AS rounding_physician_username,
           r.rounding_datetime, r.subjective, r.objective, r.assessment, r.plan,
           r.is_finalized, r.reviewed_by_id, rv.username AS reviewed_by_username,
           r.reviewed_at, r.review_notes, r.priority, r.duration_minutes, r.location,
           r.created_at, r.updated_at
    FROM rounding_notes r
    JOIN patients p ON p.id = r.patient_id
    LEFT JOIN users rp ON rp.id = r.rounding_physician_id
    LEFT JOIN users rv ON rv.id = r.reviewed_by_id
"#;

const ROUNDING_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR r.patient_id = $1)
      AND ($2::int IS NULL OR r.rounding_physician_id = $2)
      AND ($3::bool IS NULL OR r.is_finalized = $3)
      AND ($4::text IS NULL OR r.priority ILIKE '%' || $4 || '%')
      AND ($5::timestamptz IS NULL OR r.rounding_datetime >= $5)
      AND ($6::timestamptz IS NULL OR r.rounding_datetime <= $6)
"#;

const HANDOFF_SELECT: &str = r#"
    SELECT h.id, h.patient_id, p.first_name || ' ' || p.last_name AS patient_name,
           h.written_by_user_id, w.username AS written_by_username, h.written_at,
           h.current_condition, h.active_issues, h.overnight_events, h.anticipatory_guidance,
           h.plan_for_next_shift, h.vital_signs_summary, h.medications_changes_summary,
           h.labs_pending_summary, h.consults_pending_summary, h.allergies_summary_at_handoff,
           h.code_status_at_handoff, h.isolation_precautions_at_handoff, h.handoff_priority,
           h.last_updated_at, h.reviewed_by_user_id, rv.username AS reviewed_by_username,
           h.reviewed_at, h.review_notes
    FROM handoff_entries h
    JOIN patients p ON p.id = h.patient_id
    LEFT JOIN users w ON w.id = h.written_by_user_id
    LEFT JOIN users rv ON rv.id = h.reviewed_by_user_id
"#;

const FLAG_SELECT: &str = r#"
    SELECT f.id, f.patient_id, p.first_name || ' ' || p.last_name AS patient_name,
           f.flagged_by_user_id, fb.username AS flagged_by_username, f.flag_type, f.severity,
           f.notes, f.is_active, f.expires_at, f.reviewed_by_user_id,
           rv.username AS reviewed_by_username, f.reviewed_at, f.review_notes,
           f.created_at, f.updated_at
    FROM patient_flags f
    JOIN patients p ON p.id = f.patient_id
    LEFT JOIN users fb ON fb.id = f.flagged_by_user_id
    LEFT JOIN users rv ON rv.id = f.reviewed_by_user_id
"#;

const DISCHARGE_SELECT: &str = r#"
    SELECT d.id, d.patient_id, p.first_name || ' ' || p.last_name AS patient_name,
           d.created_by_user_id, cb.username AS created_by_username, d.discharge_goals,
           d.followup_plan, d.discharge_medications_summary, d.discharge_needs,
           d.anticipated_discharge_date, d.barriers_to_discharge, d.family_or_caregiver_notes,
           d.transportation_needs, d.home_environment_safety_notes, d.post_discharge_instructions,
           d.equipment_needed, d.social_work_consult_ordered, d.case_management_consult_ordered,
           d.physical_therapy_consult_ordered, d.occupational_therapy_consult_ordered,
           d.speech_therapy_consult_ordered, d.nutrition_consult_ordered, d.nursing_summary,
           d.therapy_summary, d.care_coordination_notes, d.reviewed_by_user_id,
           rv.username AS reviewed_by_username, d.reviewed_at, d.review_notes,
           d.created_at, d.updated_at
    FROM discharge_plans d
    JOIN patients p ON p.id = d.patient_id
    LEFT JOIN users cb ON cb.id = d.created_by_user_id
    LEFT JOIN users rv ON rv.id = d.reviewed_by_user_id
"#;

#[derive(Debug, Clone, Default)]
pub struct RoundingNoteFilter {
    pub patient_id: Option<String>,
    pub rounding_physician_id: Option<i32>,
    pub is_finalized: Option<bool>,
    pub priority: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct FlagFilter {
    pub active_only: bool,
    pub flag_type: Option<String>,
    pub severity: Option<String>,
}

impl PostgresManager {
    // Rounding notes

    pub async fn insert_rounding_note(&self, note: &RoundingNote) -> HmsResult<RoundingNote> {
        let query = r#"
            INSERT INTO rounding_notes (
                id, patient_id, rounding_physician_id, rounding_datetime, subjective, objective,
                assessment, plan, is_finalized, priority, duration_minutes, location,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
        "#;
        sqlx::query(query)
            .bind(&note.id)
            .bind(&note.patient_id)
            .bind(note.rounding_physician_id)
            .bind(note.rounding_datetime)
            .bind(&note.subjective)
            .bind(&note.objective)
            .bind(&note.assessment)
            .bind(&note.plan)
            .bind(note.is_finalized)
            .bind(&note.priority)
            .bind(note.duration_minutes)
            .bind(&note.location)
            .bind(note.created_at)
            .execute(&self.pool)
            .await?;

        self.find_rounding_note(&note.id)
            .await?
            .ok_or_else(|| HmsError::not_found("RoundingNote"))
    }

    pub async fn find_rounding_note(&self, note_id: &str) -> HmsResult<Option<RoundingNote>> {
        let note = sqlx::query_as::<_, RoundingNote>(&format!("{} WHERE r.id = $1", ROUNDING_SELECT))
            .bind(note_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(note)
    }

    pub async fn save_rounding_note(&self, note: &RoundingNote) -> HmsResult<RoundingNote> {
        let query = r#"
            UPDATE rounding_notes SET
                rounding_datetime = $2, subjective = $3, objective = $4, assessment = $5,
                plan = $6, is_finalized = $7, reviewed_by_id = $8, reviewed_at = $9,
                review_notes = $10, priority = $11, duration_minutes = $12, location = $13,
                updated_at = NOW()
            WHERE id = $1
        "#;
        sqlx::query(query)
            .bind(&note.id)
            .bind(note.rounding_datetime)
            .bind(&note.subjective)
            .bind(&note.objective)
            .bind(&note.assessment)
            .bind(&note.plan)
            .bind(note.is_finalized)
            .bind(note.reviewed_by_id)
            .bind(note.reviewed_at)
            .bind(&note.review_notes)
            .bind(&note.priority)
            .bind(note.duration_minutes)
            .bind(&note.location)
            .execute(&self.pool)
            .await?;

        self.find_rounding_note(&note.id)
            .await?
            .ok_or_else(|| HmsError::not_found("RoundingNote"))
    }

    pub async fn list_rounding_notes(
        &self,
        filter: &RoundingNoteFilter,
        pagination: Pagination,
    ) -> HmsResult<Page<RoundingNote>> {
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM rounding_notes r {}",
            ROUNDING_FILTER
        ))
        .bind(&filter.patient_id)
        .bind(filter.rounding_physician_id)
        .bind(filter.is_finalized)
        .bind(&filter.priority)
        .bind(filter.start)
        .bind(filter.end)
        .fetch_one(&self.pool)
        .await?;

        let query = format!(
            "{} {} ORDER BY r.rounding_datetime DESC LIMIT $7 OFFSET $8",
            ROUNDING_SELECT, ROUNDING_FILTER
        );
        let notes = sqlx::query_as::<_, RoundingNote>(&query)
            .bind(&filter.patient_id)
            .bind(filter.rounding_physician_id)
            .bind(filter.is_finalized)
            .bind(&filter.priority)
            .bind(filter.start)
            .bind(filter.end)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(notes, total, pagination))
    }

    // Handoff entries

    pub async fn insert_handoff_entry(&self, entry: &HandoffEntry) -> HmsResult<HandoffEntry> {
        let query = r#"
            INSERT INTO handoff_entries (
                id, patient_id, written_by_user_id, written_at, current_condition, active_issues,
                overnight_events, anticipatory_guidance, plan_for_next_shift, vital_signs_summary,
                medications_changes_summary, labs_pending_summary, consults_pending_summary,
                allergies_summary_at_handoff, code_status_at_handoff,
                isolation_precautions_at_handoff, handoff_priority, last_updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $4
            )
        "#;
        sqlx::query(query)
            .bind(&entry.id)
            .bind(&entry.patient_id)
            .bind(entry.written_by_user_id)
            .bind(entry.written_at)
            .bind(&entry.current_condition)
            .bind(&entry.active_issues)
            .bind(&entry.overnight_events)
            .bind(&entry.anticipatory_guidance)
            .bind(&entry.plan_for_next_shift)
            .bind(&entry.vital_signs_summary)
            .bind(&entry.medications_changes_summary)
            .bind(&entry.labs_pending_summary)
            .bind(&entry.consults_pending_summary)
            .bind(&entry.allergies_summary_at_handoff)
            .bind(&entry.code_status_at_handoff)
            .bind(&entry.isolation_precautions_at_handoff)
            .bind(&entry.handoff_priority)
            .execute(&self.pool)
            .await?;

        self.find_handoff_entry(&entry.id)
            .await?
            .ok_or_else(|| HmsError::not_found("HandoffEntry"))
    }

    pub async fn find_handoff_entry(&self, entry_id: &str) -> HmsResult<Option<HandoffEntry>> {
        let entry = sqlx::query_as::<_, HandoffEntry>(&format!("{} WHERE h.id = $1", HANDOFF_SELECT))
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    pub async fn save_handoff_entry(&self, entry: &HandoffEntry) -> HmsResult<HandoffEntry> {
        let query = r#"
            UPDATE handoff_entries SET
                current_condition = $2, active_issues = $3, overnight_events = $4,
                anticipatory_guidance = $5, plan_for_next_shift = $6, vital_signs_summary = $7,
                medications_changes_summary = $8, labs_pending_summary = $9,
                consults_pending_summary = $10, allergies_summary_at_handoff = $11,
                code_status_at_handoff = $12, isolation_precautions_at_handoff = $13,
                handoff_priority = $14, last_updated_at = $15, reviewed_by_user_id = $16,
                reviewed_at = $17, review_notes = $18
            WHERE id = $1
        "#;
        sqlx::query(query)
            .bind(&entry.id)
            .bind(&entry.current_condition)
            .bind(&entry.active_issues)
            .bind(&entry.overnight_events)
            .bind(&entry.anticipatory_guidance)
            .bind(&entry.plan_for_next_shift)
            .bind(&entry.vital_signs_summary)
            .bind(&entry.medications_changes_summary)
            .bind(&entry.labs_pending_summary)
            .bind(&entry.consults_pending_summary)
            .bind(&entry.allergies_summary_at_handoff)
            .bind(&entry.code_status_at_handoff)
            .bind(&entry.isolation_precautions_at_handoff)
            .bind(&entry.handoff_priority)
            .bind(entry.last_updated_at)
            .bind(entry.reviewed_by_user_id)
            .bind(entry.reviewed_at)
            .bind(&entry.review_notes)
            .execute(&self.pool)
            .await?;

        self.find_handoff_entry(&entry.id)
            .await?
            .ok_or_else(|| HmsError::not_found("HandoffEntry"))
    }

    pub async fn delete_handoff_entry(&self, entry_id: &str) -> HmsResult<()> {
        sqlx::query("DELETE FROM handoff_entries WHERE id = $1")
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_handoff_entries(
        &self,
        patient_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        pagination: Pagination,
    ) -> HmsResult<Page<HandoffEntry>> {
        let filter = r#"
            WHERE h.patient_id = $1
              AND ($2::timestamptz IS NULL OR h.written_at >= $2)
              AND ($3::timestamptz IS NULL OR h.written_at <= $3)
        "#;
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM handoff_entries h {}", filter))
            .bind(patient_id)
            .bind(start)
            .bind(end)
            .fetch_one(&self.pool)
            .await?;

        let query = format!(
            "{} {} ORDER BY h.written_at DESC LIMIT $4 OFFSET $5",
            HANDOFF_SELECT, filter
        );
        let entries = sqlx::query_as::<_, HandoffEntry>(&query)
            .bind(patient_id)
            .bind(start)
            .bind(end)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(entries, total, pagination))
    }

    // Patient flags

    pub async fn insert_patient_flag(&self, flag: &PatientFlag) -> HmsResult<PatientFlag> {
        let query = r#"
            INSERT INTO patient_flags (
                id, patient_id, flagged_by_user_id, flag_type, severity, notes, is_active,
                expires_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
        "#;
        sqlx::query(query)
            .bind(&flag.id)
            .bind(&flag.patient_id)
            .bind(flag.flagged_by_user_id)
            .bind(&flag.flag_type)
            .bind(&flag.severity)
            .bind(&flag.notes)
            .bind(flag.is_active)
            .bind(flag.expires_at)
            .bind(flag.created_at)
            .execute(&self.pool)
            .await?;

        self.find_patient_flag(&flag.id)
            .await?
            .ok_or_else(|| HmsError::not_found("PatientFlag"))
    }

    pub async fn find_patient_flag(&self, flag_id: &str) -> HmsResult<Option<PatientFlag>> {
        let flag = sqlx::query_as::<_, PatientFlag>(&format!("{} WHERE f.id = $1", FLAG_SELECT))
            .bind(flag_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(flag)
    }

    pub async fn save_patient_flag(&self, flag: &PatientFlag) -> HmsResult<PatientFlag> {
        let query = r#"
            UPDATE patient_flags SET
                flag_type = $2, severity = $3, notes = $4, is_active = $5, expires_at = $6,
                reviewed_by_user_id = $7, reviewed_at = $8, review_notes = $9, updated_at = NOW()
            WHERE id = $1
        "#;
        sqlx::query(query)
            .bind(&flag.id)
            .bind(&flag.flag_type)
            .bind(&flag.severity)
            .bind(&flag.notes)
            .bind(flag.is_active)
            .bind(flag.expires_at)
            .bind(flag.reviewed_by_user_id)
            .bind(flag.reviewed_at)
            .bind(&flag.review_notes)
            .execute(&self.pool)
            .await?;

        self.find_patient_flag(&flag.id)
            .await?
            .ok_or_else(|| HmsError::not_found("PatientFlag"))
    }

    pub async fn list_patient_flags(
        &self,
        patient_id: &str,
        filter: &FlagFilter,
        pagination: Pagination,
    ) -> HmsResult<Page<PatientFlag>> {
        let clause = r#"
            WHERE f.patient_id = $1
              AND ($2::bool = FALSE OR f.is_active = TRUE)
              AND ($3::text IS NULL OR f.flag_type ILIKE '%' || $3 || '%')
              AND ($4::text IS NULL OR f.severity ILIKE '%' || $4 || '%')
        "#;
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM patient_flags f {}", clause))
            .bind(patient_id)
            .bind(filter.active_only)
            .bind(&filter.flag_type)
            .bind(&filter.severity)
            .fetch_one(&self.pool)
            .await?;

        let query = format!(
            "{} {} ORDER BY f.is_active DESC, f.created_at DESC LIMIT $5 OFFSET $6",
            FLAG_SELECT, clause
        );
        let flags = sqlx::query_as::<_, PatientFlag>(&query)
            .bind(patient_id)
            .bind(filter.active_only)
            .bind(&filter.flag_type)
            .bind(&filter.severity)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(flags, total, pagination))
    }

    // Discharge plans

    pub async fn insert_discharge_plan(&self, plan: &DischargePlan) -> HmsResult<DischargePlan> {
        let query = r#"
            INSERT INTO discharge_plans (
                id, patient_id, created_by_user_id, discharge_goals, followup_plan,
                discharge_medications_summary, discharge_needs, anticipated_discharge_date,
                barriers_to_discharge, family_or_caregiver_notes, transportation_needs,
                home_environment_safety_notes, post_discharge_instructions, equipment_needed,
                social_work_consult_ordered, case_management_consult_ordered,
                physical_therapy_consult_ordered, occupational_therapy_consult_ordered,
                speech_therapy_consult_ordered, nutrition_consult_ordered, nursing_summary,
                therapy_summary, care_coordination_notes, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23, $24, $24
            )
        "#;
        sqlx::query(query)
            .bind(&plan.id)
            .bind(&plan.patient_id)
            .bind(plan.created_by_user_id)
            .bind(&plan.discharge_goals)
            .bind(&plan.followup_plan)
            .bind(&plan.discharge_medications_summary)
            .bind(&plan.discharge_needs)
            .bind(plan.anticipated_discharge_date)
            .bind(&plan.barriers_to_discharge)
            .bind(&plan.family_or_caregiver_notes)
            .bind(&plan.transportation_needs)
            .bind(&plan.home_environment_safety_notes)
            .bind(&plan.post_discharge_instructions)
            .bind(&plan.equipment_needed)
            .bind(plan.social_work_consult_ordered)
            .bind(plan.case_management_consult_ordered)
            .bind(plan.physical_therapy_consult_ordered)
            .bind(plan.occupational_therapy_consult_ordered)
            .bind(plan.speech_therapy_consult_ordered)
            .bind(plan.nutrition_consult_ordered)
            .bind(&plan.nursing_summary)
            .bind(&plan.therapy_summary)
            .bind(&plan.care_coordination_notes)
            .bind(plan.created_at)
            .execute(&self.pool)
            .await?;

        self.find_discharge_plan(&plan.id)
            .await?
            .ok_or_else(|| HmsError::not_found("DischargePlan"))
    }

    pub async fn find_discharge_plan(&self, plan_id: &str) -> HmsResult<Option<DischargePlan>> {
        let plan = sqlx::query_as::<_, DischargePlan>(&format!("{} WHERE d.id = $1", DISCHARGE_SELECT))
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(plan)
    }

    pub async fn save_discharge_plan(&self, plan: &DischargePlan) -> HmsResult<DischargePlan> {
        let query = r#"
            UPDATE discharge_plans SET
                discharge_goals = $2, followup_plan = $3, discharge_medications_summary = $4,
                discharge_needs = $5, anticipated_discharge_date = $6, barriers_to_discharge = $7,
                family_or_caregiver_notes = $8, transportation_needs = $9,
                home_environment_safety_notes = $10, post_discharge_instructions = $11,
                equipment_needed = $12, social_work_consult_ordered = $13,
                case_management_consult_ordered = $14, physical_therapy_consult_ordered = $15,
                occupational_therapy_consult_ordered = $16, speech_therapy_consult_ordered = $17,
                nutrition_consult_ordered = $18, nursing_summary = $19, therapy_summary = $20,
                care_coordination_notes = $21, reviewed_by_user_id = $22, reviewed_at = $23,
                review_notes = $24, updated_at = NOW()
            WHERE id = $1
        "#;
        sqlx::query(query)
            .bind(&plan.id)
            .bind(&plan.discharge_goals)
            .bind(&plan.followup_plan)
            .bind(&plan.discharge_medications_summary)
            .bind(&plan.discharge_needs)
            .bind(plan.anticipated_discharge_date)
            .bind(&plan.barriers_to_discharge)
            .bind(&plan.family_or_caregiver_notes)
            .bind(&plan.transportation_needs)
            .bind(&plan.home_environment_safety_notes)
            .bind(&plan.post_discharge_instructions)
            .bind(&plan.equipment_needed)
            .bind(plan.social_work_consult_ordered)
            .bind(plan.case_management_consult_ordered)
            .bind(plan.physical_therapy_consult_ordered)
            .bind(plan.occupational_therapy_consult_ordered)
            .bind(plan.speech_therapy_consult_ordered)
            .bind(plan.nutrition_consult_ordered)
            .bind(&plan.nursing_summary)
            .bind(&plan.therapy_summary)
            .bind(&plan.care_coordination_notes)
            .bind(plan.reviewed_by_user_id)
            .bind(plan.reviewed_at)
            .bind(&plan.review_notes)
            .execute(&self.pool)
            .await?;

        self.find_discharge_plan(&plan.id)
            .await?
            .ok_or_else(|| HmsError::not_found("DischargePlan"))
    }

    pub async fn delete_discharge_plan(&self, plan_id: &str) -> HmsResult<()> {
        sqlx::query("DELETE FROM discharge_plans WHERE id = $1")
            .bind(plan_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_discharge_plans(
        &self,
        patient_id: &str,
        pagination: Pagination,
    ) -> HmsResult<Page<DischargePlan>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discharge_plans WHERE patient_id = $1")
            .bind(patient_id)
            .fetch_one(&self.pool)
            .await?;

        let query = format!(
            "{} WHERE d.patient_id = $1 ORDER BY d.updated_at DESC LIMIT $2 OFFSET $3",
            DISCHARGE_SELECT
        );
        let plans = sqlx::query_as::<_, DischargePlan>(&query)
            .bind(patient_id)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(plans, total, pagination))
    }
}
