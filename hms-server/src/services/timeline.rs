//! Chronological merge of a patient's chart events

use crate::models::insight::TimelineOrder;
use crate::models::{ClinicalNote, LabResult, MedicationAdministration};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEvent {
    pub event_type: &'static str,
    pub event_time: DateTime<Utc>,
    pub summary: String,
    pub details: Value,
}

impl From<&ClinicalNote> for TimelineEvent {
    fn from(note: &ClinicalNote) -> Self {
        Self {
            event_type: "Clinical Note",
            event_time: note.created_at,
            summary: format!(
                "{}: {}",
                note.note_type,
                note.title.as_deref().unwrap_or("Untitled")
            ),
            details: json!({
                "note_id": note.id,
                "author_id": note.author_user_id,
                "status": note.status,
            }),
        }
    }
}

impl From<&TimelineOrder> for TimelineEvent {
    fn from(order: &TimelineOrder) -> Self {
        Self {
            event_type: "Order Placed",
            event_time: order.order_placed_at,
            summary: format!(
                "Order for '{}' with status '{}'",
                order.item_name.as_deref().unwrap_or("Unknown item"),
                order.status
            ),
            details: json!({
                "order_id": order.id,
                "ordering_physician_id": order.ordering_physician_id,
                "priority": order.priority,
            }),
        }
    }
}

impl From<&LabResult> for TimelineEvent {
    fn from(lab: &LabResult) -> Self {
        Self {
            event_type: "Lab Result",
            event_time: lab.result_datetime,
            summary: format!(
                "Result for '{}': {} {}",
                lab.test_name,
                lab.value.as_deref().unwrap_or_default(),
                lab.units.as_deref().unwrap_or_default()
            ),
            details: json!({
                "lab_result_id": lab.id,
                "abnormal_flag": lab.abnormal_flag,
                "status": lab.status,
            }),
        }
    }
}

impl From<&MedicationAdministration> for TimelineEvent {
    fn from(entry: &MedicationAdministration) -> Self {
        Self {
            event_type: "Medication Administration",
            event_time: entry.administration_time,
            summary: format!(
                "{}: '{}'",
                entry.status,
                entry.medication_name.as_deref().unwrap_or("Unknown medication")
            ),
            details: json!({
                "mar_id": entry.id,
                "administered_by_id": entry.administered_by_user_id,
                "dose_given": entry.dose_given,
            }),
        }
    }
}

/// Merge every source, newest first. Ties keep source order.
pub fn build_timeline(
    notes: &[ClinicalNote],
    orders: &[TimelineOrder],
    labs: &[LabResult],
    administrations: &[MedicationAdministration],
) -> Vec<TimelineEvent> {
    let mut events: Vec<TimelineEvent> = notes
        .iter()
        .map(TimelineEvent::from)
        .chain(orders.iter().map(TimelineEvent::from))
        .chain(labs.iter().map(TimelineEvent::from))
        .chain(administrations.iter().map(TimelineEvent::from))
        .collect();
    events.sort_by(|a, b| b.event_time.cmp(&a.event_time));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, d, 12, 0, 0).unwrap()
    }

    fn note(created: DateTime<Utc>) -> ClinicalNote {
        ClinicalNote {
            id: "note-1".into(),
            patient_id: "p1".into(),
            author_user_id: 3,
            note_type: "Progress Note".into(),
            service_specialty: None,
            title: None,
            content_text: "Stable overnight".into(),
            status: "Draft".into(),
            signed_at: None,
            signed_by_user_id: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn lab(at: DateTime<Utc>) -> LabResult {
        LabResult {
            id: "lab-1".into(),
            patient_id: "p1".into(),
            ordered_test_id: None,
            test_name: "Potassium".into(),
            panel_name: None,
            value: Some("5.9".into()),
            value_numeric: Some(5.9),
            units: Some("mmol/L".into()),
            reference_range: None,
            abnormal_flag: Some("H".into()),
            status: "Final".into(),
            collection_datetime: at,
            result_datetime: at,
            performing_lab: None,
            acknowledged_at: None,
            acknowledged_by_user_id: None,
            acknowledged_by_username: None,
        }
    }

    #[test]
    fn merges_newest_first() {
        let order = TimelineOrder {
            id: "ord-1".into(),
            item_name: Some("Complete Blood Count".into()),
            status: "Active".into(),
            priority: "Routine".into(),
            ordering_physician_id: 3,
            order_placed_at: day(2),
        };
        let mar = MedicationAdministration {
            id: "mar-1".into(),
            patient_id: "p1".into(),
            patient_medication_id: "pm-1".into(),
            medication_name: Some("Heparin".into()),
            administered_by_user_id: 5,
            administered_by_username: None,
            administration_time: day(4),
            status: "Given".into(),
            dose_given: Some("5000 units".into()),
            notes: None,
        };

        let events = build_timeline(&[note(day(1))], &[order], &[lab(day(3))], &[mar]);
        let kinds: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            ["Medication Administration", "Lab Result", "Order Placed", "Clinical Note"]
        );
        assert_eq!(events[0].summary, "Given: 'Heparin'");
        assert_eq!(events[1].summary, "Result for 'Potassium': 5.9 mmol/L");
        assert_eq!(events[2].summary, "Order for 'Complete Blood Count' with status 'Active'");
        assert_eq!(events[3].summary, "Progress Note: Untitled");
        assert_eq!(events[3].details["author_id"], 3);
    }

    #[test]
    fn empty_chart_yields_empty_timeline() {
        assert!(build_timeline(&[], &[], &[], &[]).is_empty());
    }
}
