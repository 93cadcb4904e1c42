//! Care coordination records: rounds, handoffs, flags and discharge plans
//!
//! Each row is loaded joined with the patient's name and the usernames of
//! the staff involved, so the same struct serves as the API representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoundingNote {
    pub id: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub rounding_physician_id: i32,
    pub rounding_physician_username: Option<String>,
    pub rounding_datetime: DateTime<Utc>,
    pub subjective: Option<String>,
    pub objective: Option<String>,
    pub assessment: Option<String>,
    pub plan: Option<String>,
    pub is_finalized: bool,
    pub reviewed_by_id: Option<i32>,
    pub reviewed_by_username: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub priority: Option<String>,
    pub duration_minutes: Option<i32>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HandoffEntry {
    pub id: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub written_by_user_id: i32,
    pub written_by_username: Option<String>,
    pub written_at: DateTime<Utc>,
    pub current_condition: Option<String>,
    pub active_issues: Option<String>,
    pub overnight_events: Option<String>,
    pub anticipatory_guidance: Option<String>,
    pub plan_for_next_shift: Option<String>,
    pub vital_signs_summary: Option<String>,
    pub medications_changes_summary: Option<String>,
    pub labs_pending_summary: Option<String>,
    pub consults_pending_summary: Option<String>,
    pub allergies_summary_at_handoff: Option<String>,
    pub code_status_at_handoff: Option<String>,
    pub isolation_precautions_at_handoff: Option<String>,
    pub handoff_priority: Option<String>,
    pub last_updated_at: DateTime<Utc>,
    pub reviewed_by_user_id: Option<i32>,
    pub reviewed_by_username: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PatientFlag {
    pub id: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub flagged_by_user_id: i32,
    pub flagged_by_username: Option<String>,
    pub flag_type: String,
    pub severity: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub reviewed_by_user_id: Option<i32>,
    pub reviewed_by_username: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PatientFlag {
    pub fn mark_reviewed(&mut self, reviewer_id: i32, notes: String, now: DateTime<Utc>) {
        self.reviewed_by_user_id = Some(reviewer_id);
        self.reviewed_at = Some(now);
        self.review_notes = Some(notes);
    }

    /// Turn the flag off, folding the reason into the review trail
    pub fn deactivate(&mut self, user_id: i32, reason: &str, now: DateTime<Utc>) {
        self.is_active = false;
        if self.reviewed_by_user_id.is_none() {
            self.mark_reviewed(user_id, reason.to_string(), now);
        } else {
            let previous = self.review_notes.as_deref().unwrap_or("");
            self.review_notes = Some(format!("{} Deactivated: {}", previous, reason).trim().to_string());
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DischargePlan {
    pub id: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub created_by_user_id: Option<i32>,
    pub created_by_username: Option<String>,
    pub discharge_goals: Option<String>,
    pub followup_plan: Option<String>,
    pub discharge_medications_summary: Option<String>,
    pub discharge_needs: Option<String>,
    pub anticipated_discharge_date: Option<DateTime<Utc>>,
    pub barriers_to_discharge: Option<String>,
    pub family_or_caregiver_notes: Option<String>,
    pub transportation_needs: Option<String>,
    pub home_environment_safety_notes: Option<String>,
    pub post_discharge_instructions: Option<String>,
    pub equipment_needed: Option<String>,
    pub social_work_consult_ordered: bool,
    pub case_management_consult_ordered: bool,
    pub physical_therapy_consult_ordered: bool,
    pub occupational_therapy_consult_ordered: bool,
    pub speech_therapy_consult_ordered: bool,
    pub nutrition_consult_ordered: bool,
    pub nursing_summary: Option<String>,
    pub therapy_summary: Option<String>,
    pub care_coordination_notes: Option<String>,
    pub reviewed_by_user_id: Option<i32>,
    pub reviewed_by_username: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag() -> PatientFlag {
        let now = Utc::now();
        PatientFlag {
            id: "f1".into(),
            patient_id: "p1".into(),
            patient_name: None,
            flagged_by_user_id: 1,
            flagged_by_username: None,
            flag_type: "FallRisk".into(),
            severity: Some("High".into()),
            notes: None,
            is_active: true,
            expires_at: None,
            reviewed_by_user_id: None,
            reviewed_by_username: None,
            reviewed_at: None,
            review_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn deactivating_an_unreviewed_flag_reviews_it() {
        let mut f = flag();
        f.deactivate(7, "Resolved", Utc::now());
        assert!(!f.is_active);
        assert_eq!(f.reviewed_by_user_id, Some(7));
        assert_eq!(f.review_notes.as_deref(), Some("Resolved"));
    }

    #[test]
    fn deactivating_a_reviewed_flag_appends_reason() {
        let mut f = flag();
        f.mark_reviewed(3, "Checked.".into(), Utc::now());
        f.deactivate(7, "Discharged", Utc::now());
        assert_eq!(f.reviewed_by_user_id, Some(3));
        assert_eq!(f.review_notes.as_deref(), Some("Checked. Deactivated: Discharged"));
    }
}
