//! Shift handoff entries

use super::{bad_request, forbidden, query_bound};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{CurrentUser, JsonBody};
use crate::api::handlers::nullable_text;
use crate::api::responses::{message, paged, MessageResponse};
use crate::api::ApiState;
use crate::core::PaginationQuery;
use crate::models::HandoffEntry;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

const REQUIRED_FIELDS: [&str; 3] = ["current_condition", "active_issues", "plan_for_next_shift"];

#[derive(Debug, Default, Deserialize)]
pub struct HandoffQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationQuery,
}

async fn entry_or_404(state: &ApiState, entry_id: &str) -> ApiResult<HandoffEntry> {
    state.db().find_handoff_entry(entry_id).await?.ok_or(ApiError::NotFound)
}

fn entry_response(text: &str, entry: &HandoffEntry) -> Json<MessageResponse> {
    Json(MessageResponse::new(text).with("handoff_entry", entry))
}

/// Comma-joined active allergens, or "NKA"
fn allergy_snapshot(allergens: &[String]) -> String {
    if allergens.is_empty() {
        "NKA".to_string()
    } else {
        allergens.join(", ")
    }
}

pub async fn create_handoff_entry(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<HandoffEntry>)> {
    user.require("handoff:create")?;
    let patient = state
        .db()
        .find_patient(&patient_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if body.is_empty() || REQUIRED_FIELDS.iter().any(|f| !body.has(f)) {
        return Err(bad_request(
            "Missing required fields: current_condition, active_issues, plan_for_next_shift",
        ));
    }

    let allergies = match body.text_lossy("allergies_summary_at_handoff") {
        Some(summary) => summary,
        None => allergy_snapshot(&state.db().active_allergen_names(&patient.id).await?),
    };
    let code_status =
        nullable_text(&body, "code_status_at_handoff").unwrap_or_else(|| Some(patient.code_status.clone()));
    let isolation = nullable_text(&body, "isolation_precautions_at_handoff")
        .unwrap_or_else(|| patient.isolation_precautions.clone());
    let now = Utc::now();

    let entry = state
        .db()
        .insert_handoff_entry(&HandoffEntry {
            id: Uuid::new_v4().to_string(),
            patient_id: patient.id.clone(),
            patient_name: None,
            written_by_user_id: user.id(),
            written_by_username: None,
            written_at: now,
            current_condition: body.text_lossy("current_condition"),
            active_issues: body.text_lossy("active_issues"),
            overnight_events: body.text_lossy("overnight_events"),
            anticipatory_guidance: body.text_lossy("anticipatory_guidance"),
            plan_for_next_shift: body.text_lossy("plan_for_next_shift"),
            vital_signs_summary: body.text_lossy("vital_signs_summary"),
            medications_changes_summary: body.text_lossy("medications_changes_summary"),
            labs_pending_summary: body.text_lossy("labs_pending_summary"),
            consults_pending_summary: body.text_lossy("consults_pending_summary"),
            allergies_summary_at_handoff: Some(allergies),
            code_status_at_handoff: code_status,
            isolation_precautions_at_handoff: isolation,
            handoff_priority: Some(body.text("handoff_priority").unwrap_or("Normal").to_string()),
            last_updated_at: now,
            reviewed_by_user_id: None,
            reviewed_by_username: None,
            reviewed_at: None,
            review_notes: None,
        })
        .await?;
    info!("Handoff entry {} written for patient {} by user {}", entry.id, patient.id, user.id());
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn get_handoff_entry(
    State(state): State<ApiState>,
    Path(entry_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<HandoffEntry>> {
    user.require("handoff:read")?;
    let entry = entry_or_404(&state, &entry_id).await?;
    let involved = entry.written_by_user_id == user.id() || entry.reviewed_by_user_id == Some(user.id());
    if !involved && !user.has("handoff:read:any") {
        return Err(forbidden("Unauthorized to view this handoff entry."));
    }
    Ok(Json(entry))
}

pub async fn list_handoff_entries(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    Query(params): Query<HandoffQuery>,
) -> ApiResult<Json<Value>> {
    user.require("handoff:read")?;
    if !state.db().patient_exists(&patient_id).await? {
        return Err(ApiError::NotFound);
    }
    let start = query_bound(params.start_date.as_deref(), "Invalid start_date format")?;
    let end = query_bound(params.end_date.as_deref(), "Invalid end_date format")?;
    let page = state
        .db()
        .list_handoff_entries(&patient_id, start, end, params.pagination.resolve(10))
        .await?;
    paged("handoff_entries", page)
}

pub async fn update_handoff_entry(
    State(state): State<ApiState>,
    Path(entry_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<Json<MessageResponse>> {
    user.require("handoff:update")?;
    let mut entry = entry_or_404(&state, &entry_id).await?;
    let can_update_any = user.has("handoff:update:any");
    if entry.written_by_user_id != user.id() && !can_update_any {
        return Err(forbidden(
            "Unauthorized: You are not the author or lack general update privileges.",
        ));
    }
    if entry.reviewed_at.is_some() && !(user.has("handoff:update:reviewed") || can_update_any) {
        return Err(forbidden(
            "Cannot update an already reviewed handoff entry without specific privileges.",
        ));
    }
    if body.is_empty() {
        return Err(bad_request("No update data provided"));
    }

    for (key, slot) in [
        ("current_condition", &mut entry.current_condition),
        ("active_issues", &mut entry.active_issues),
        ("overnight_events", &mut entry.overnight_events),
        ("anticipatory_guidance", &mut entry.anticipatory_guidance),
        ("plan_for_next_shift", &mut entry.plan_for_next_shift),
        ("vital_signs_summary", &mut entry.vital_signs_summary),
        ("medications_changes_summary", &mut entry.medications_changes_summary),
        ("labs_pending_summary", &mut entry.labs_pending_summary),
        ("consults_pending_summary", &mut entry.consults_pending_summary),
        ("allergies_summary_at_handoff", &mut entry.allergies_summary_at_handoff),
        ("code_status_at_handoff", &mut entry.code_status_at_handoff),
        ("isolation_precautions_at_handoff", &mut entry.isolation_precautions_at_handoff),
        ("handoff_priority", &mut entry.handoff_priority),
        ("review_notes", &mut entry.review_notes),
    ] {
        if let Some(value) = nullable_text(&body, key) {
            *slot = value;
        }
    }
    entry.last_updated_at = Utc::now();

    let entry = state.db().save_handoff_entry(&entry).await?;
    info!("Handoff entry {} updated by user {}", entry.id, user.id());
    Ok(entry_response("HandoffEntry updated", &entry))
}

pub async fn review_handoff_entry(
    State(state): State<ApiState>,
    Path(entry_id): Path<String>,
    user: CurrentUser,
    body: Result<JsonBody, ApiError>,
) -> ApiResult<Json<MessageResponse>> {
    user.require("handoff:review")?;
    let mut entry = entry_or_404(&state, &entry_id).await?;
    if entry.reviewed_at.is_some() {
        let text = if entry.reviewed_by_user_id == Some(user.id()) {
            "You have already reviewed this handoff entry."
        } else {
            "Handoff entry already reviewed by another user."
        };
        return Err(ApiError::message(StatusCode::BAD_REQUEST, text));
    }
    if entry.written_by_user_id == user.id() {
        return Err(forbidden("Cannot review your own handoff entry."));
    }

    entry.reviewed_by_user_id = Some(user.id());
    entry.reviewed_at = Some(Utc::now());
    if let Some(notes) = body.ok().and_then(|b| b.text_lossy("review_notes")) {
        entry.review_notes = Some(notes);
    }
    let entry = state.db().save_handoff_entry(&entry).await?;
    info!("Handoff entry {} reviewed by user {}", entry.id, user.id());
    Ok(entry_response("HandoffEntry reviewed", &entry))
}

pub async fn delete_handoff_entry(
    State(state): State<ApiState>,
    Path(entry_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    user.require("handoff:delete")?;
    let entry = entry_or_404(&state, &entry_id).await?;
    if entry.written_by_user_id != user.id() && !user.has("handoff:delete:any") {
        return Err(forbidden("Unauthorized to delete this handoff entry."));
    }
    state.db().delete_handoff_entry(&entry.id).await?;
    info!("Handoff entry {} deleted by user {}", entry.id, user.id());
    Ok(message("HandoffEntry deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allergy_snapshot_defaults_to_nka() {
        assert_eq!(allergy_snapshot(&[]), "NKA");
        assert_eq!(
            allergy_snapshot(&["Penicillin".to_string(), "Latex".to_string()]),
            "Penicillin, Latex"
        );
    }
}
