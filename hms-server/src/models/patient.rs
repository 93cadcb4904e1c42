//! Patient chart models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Patient {
    pub id: String,
    pub mrn: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub attending_physician_id: Option<i32>,
    pub code_status: String,
    pub isolation_precautions: Option<String>,
    pub admission_date: Option<DateTime<Utc>>,
    pub discharge_date: Option<DateTime<Utc>>,
    pub known_cad: bool,
    pub congestive_heart_failure: bool,
    pub hypertension: bool,
    pub diabetes: bool,
    pub stroke_or_tia: bool,
    pub vascular_disease: bool,
    pub atrial_fibrillation: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn age_on(&self, today: NaiveDate) -> i32 {
        crate::core::types::age_on(self.date_of_birth, today)
    }

    pub fn age(&self) -> i32 {
        self.age_on(Utc::now().date_naive())
    }

    /// Field snapshot used for the audit diff on update
    pub fn audit_fields(&self) -> Vec<(&'static str, serde_json::Value)> {
        use serde_json::json;
        vec![
            ("mrn", json!(self.mrn)),
            ("first_name", json!(self.first_name)),
            ("last_name", json!(self.last_name)),
            ("date_of_birth", json!(self.date_of_birth)),
            ("gender", json!(self.gender)),
            ("attending_physician_id", json!(self.attending_physician_id)),
            ("code_status", json!(self.code_status)),
            ("isolation_precautions", json!(self.isolation_precautions)),
            ("admission_date", json!(self.admission_date)),
            ("discharge_date", json!(self.discharge_date)),
            ("known_cad", json!(self.known_cad)),
            ("congestive_heart_failure", json!(self.congestive_heart_failure)),
            ("hypertension", json!(self.hypertension)),
            ("diabetes", json!(self.diabetes)),
            ("stroke_or_tia", json!(self.stroke_or_tia)),
            ("vascular_disease", json!(self.vascular_disease)),
            ("atrial_fibrillation", json!(self.atrial_fibrillation)),
        ]
    }
}

/// Compact banner shown at the top of a chart
#[derive(Debug, Clone, Serialize)]
pub struct PatientHeader {
    pub patient_id: String,
    pub mrn: String,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub age: i32,
    pub gender: Option<String>,
    pub attending_physician_id: Option<i32>,
    pub code_status: String,
    pub isolation_precautions: Option<String>,
    pub allergies_summary: AllergySummary,
}

/// First three active allergen names, or the literal "NKA"
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AllergySummary {
    Allergens(Vec<String>),
    NoKnownAllergies(&'static str),
}

impl AllergySummary {
    pub fn from_names(mut names: Vec<String>) -> Self {
        if names.is_empty() {
            AllergySummary::NoKnownAllergies("NKA")
        } else {
            names.truncate(3);
            AllergySummary::Allergens(names)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PatientAllergy {
    pub id: String,
    pub patient_id: String,
    pub allergen_name: String,
    pub reaction_description: Option<String>,
    pub severity: String,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by_user_id: Option<i32>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProblemListEntry {
    pub id: String,
    pub patient_id: String,
    pub icd10_code: Option<String>,
    pub problem_description: String,
    pub onset_date: Option<NaiveDate>,
    pub status: String,
    pub recorded_by_user_id: Option<i32>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClinicalNote {
    pub id: String,
    pub patient_id: String,
    pub author_user_id: i32,
    pub note_type: String,
    pub service_specialty: Option<String>,
    pub title: Option<String>,
    pub content_text: String,
    pub status: String,
    pub signed_at: Option<DateTime<Utc>>,
    pub signed_by_user_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List entry for `GET /patients/:id/notes`
#[derive(Debug, Clone, Serialize)]
pub struct NoteSummary {
    pub note_id: String,
    pub note_type: String,
    pub title: Option<String>,
    pub author_user_id: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub signed_at: Option<DateTime<Utc>>,
}

impl From<ClinicalNote> for NoteSummary {
    fn from(note: ClinicalNote) -> Self {
        Self {
            note_id: note.id,
            note_type: note.note_type,
            title: note.title,
            author_user_id: note.author_user_id,
            status: note.status,
            created_at: note.created_at,
            updated_at: note.updated_at,
            signed_at: note.signed_at,
        }
    }
}

/// Values for a new patient row
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub mrn: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub attending_physician_id: Option<i32>,
    pub code_status: String,
    pub isolation_precautions: Option<String>,
    pub admission_date: Option<DateTime<Utc>>,
    pub known_cad: bool,
    pub congestive_heart_failure: bool,
    pub hypertension: bool,
    pub diabetes: bool,
    pub stroke_or_tia: bool,
    pub vascular_disease: bool,
    pub atrial_fibrillation: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allergy_summary_truncates_or_reports_nka() {
        assert_eq!(
            serde_json::to_value(AllergySummary::from_names(vec![])).unwrap(),
            serde_json::json!("NKA")
        );
        let names = vec!["Penicillin", "Latex", "Peanuts", "Sulfa"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            serde_json::to_value(AllergySummary::from_names(names)).unwrap(),
            serde_json::json!(["Penicillin", "Latex", "Peanuts"])
        );
    }
}
