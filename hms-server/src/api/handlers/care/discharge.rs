//! Discharge planning

use super::{bad_request, forbidden};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{CurrentUser, JsonBody};
use crate::api::handlers::{date_or_datetime_field, nullable_text};
use crate::api::responses::{created, message, paged, MessageResponse};
use crate::api::ApiState;
use crate::core::PaginationQuery;
use crate::models::DischargePlan;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

async fn plan_or_404(state: &ApiState, plan_id: &str) -> ApiResult<DischargePlan> {
    state.db().find_discharge_plan(plan_id).await?.ok_or(ApiError::NotFound)
}

fn text_fields(plan: &mut DischargePlan) -> [(&'static str, &mut Option<String>); 13] {
    [
        ("discharge_goals", &mut plan.discharge_goals),
        ("followup_plan", &mut plan.followup_plan),
        ("discharge_medications_summary", &mut plan.discharge_medications_summary),
        ("discharge_needs", &mut plan.discharge_needs),
        ("barriers_to_discharge", &mut plan.barriers_to_discharge),
        ("family_or_caregiver_notes", &mut plan.family_or_caregiver_notes),
        ("transportation_needs", &mut plan.transportation_needs),
        ("home_environment_safety_notes", &mut plan.home_environment_safety_notes),
        ("post_discharge_instructions", &mut plan.post_discharge_instructions),
        ("equipment_needed", &mut plan.equipment_needed),
        ("nursing_summary", &mut plan.nursing_summary),
        ("therapy_summary", &mut plan.therapy_summary),
        ("care_coordination_notes", &mut plan.care_coordination_notes),
    ]
}

fn consult_fields(plan: &mut DischargePlan) -> [(&'static str, &mut bool); 6] {
    [
        ("social_work_consult_ordered", &mut plan.social_work_consult_ordered),
        ("case_management_consult_ordered", &mut plan.case_management_consult_ordered),
        ("physical_therapy_consult_ordered", &mut plan.physical_therapy_consult_ordered),
        ("occupational_therapy_consult_ordered", &mut plan.occupational_therapy_consult_ordered),
        ("speech_therapy_consult_ordered", &mut plan.speech_therapy_consult_ordered),
        ("nutrition_consult_ordered", &mut plan.nutrition_consult_ordered),
    ]
}

/// Copy text and consult fields present in `body`; non-boolean consult values are ignored
fn apply_plan_fields(plan: &mut DischargePlan, body: &JsonBody) {
    for (key, slot) in text_fields(plan) {
        if let Some(value) = nullable_text(body, key) {
            *slot = value;
        }
    }
    for (key, slot) in consult_fields(plan) {
        if let Some(ordered) = body.flag(key) {
            *slot = ordered;
        }
    }
}

fn blank_plan(patient_id: String, created_by: i32) -> DischargePlan {
    let now = Utc::now();
    DischargePlan {
        id: Uuid::new_v4().to_string(),
        patient_id,
        patient_name: None,
        created_by_user_id: Some(created_by),
        created_by_username: None,
        discharge_goals: None,
        followup_plan: None,
        discharge_medications_summary: None,
        discharge_needs: None,
        anticipated_discharge_date: None,
        barriers_to_discharge: None,
        family_or_caregiver_notes: None,
        transportation_needs: None,
        home_environment_safety_notes: None,
        post_discharge_instructions: None,
        equipment_needed: None,
        social_work_consult_ordered: false,
        case_management_consult_ordered: false,
        physical_therapy_consult_ordered: false,
        occupational_therapy_consult_ordered: false,
        speech_therapy_consult_ordered: false,
        nutrition_consult_ordered: false,
        nursing_summary: None,
        therapy_summary: None,
        care_coordination_notes: None,
        reviewed_by_user_id: None,
        reviewed_by_username: None,
        reviewed_at: None,
        review_notes: None,
        created_at: now,
        updated_at: now,
    }
}

pub async fn create_discharge_plan(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    user.require("discharge_plan:create")?;
    if !state.db().patient_exists(&patient_id).await? {
        return Err(ApiError::NotFound);
    }
    if body.is_empty() {
        return Err(bad_request("No data provided"));
    }

    let mut plan = blank_plan(patient_id, user.id());
    plan.anticipated_discharge_date = date_or_datetime_field(&body, "anticipated_discharge_date", || {
        bad_request(
            "Invalid anticipated_discharge_date format. Use ISO format (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS).",
        )
    })?;
    apply_plan_fields(&mut plan, &body);

    let plan = state.db().insert_discharge_plan(&plan).await?;
    info!("Discharge plan {} created for patient {} by user {}", plan.id, plan.patient_id, user.id());
    Ok(created(
        MessageResponse::new("Discharge plan created successfully.").with("discharge_plan", &plan),
    ))
}

pub async fn list_discharge_plans(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    Query(pagination): Query<PaginationQuery>,
) -> ApiResult<Json<Value>> {
    user.require("discharge_plan:read")?;
    if !state.db().patient_exists(&patient_id).await? {
        return Err(ApiError::NotFound);
    }
    let page = state
        .db()
        .list_discharge_plans(&patient_id, pagination.resolve(10))
        .await?;
    paged("discharge_plans", page)
}

pub async fn get_discharge_plan(
    State(state): State<ApiState>,
    Path(plan_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<DischargePlan>> {
    user.require("discharge_plan:read")?;
    Ok(Json(plan_or_404(&state, &plan_id).await?))
}

pub async fn update_discharge_plan(
    State(state): State<ApiState>,
    Path(plan_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<Json<MessageResponse>> {
    user.require("discharge_plan:update")?;
    let mut plan = plan_or_404(&state, &plan_id).await?;
    if plan.created_by_user_id != Some(user.id()) && !user.has("discharge_plan:update:any") {
        return Err(forbidden(
            "Unauthorized: You are not the creator or lack general update privileges.",
        ));
    }
    if body.is_empty() {
        return Err(bad_request("No update data provided"));
    }

    if body.has("anticipated_discharge_date") {
        plan.anticipated_discharge_date = date_or_datetime_field(&body, "anticipated_discharge_date", || {
            bad_request("Invalid anticipated_discharge_date format. Use ISO format.")
        })?;
    }
    apply_plan_fields(&mut plan, &body);
    plan.updated_at = Utc::now();

    let plan = state.db().save_discharge_plan(&plan).await?;
    info!("Discharge plan {} updated by user {}", plan.id, user.id());
    Ok(Json(
        MessageResponse::new("Discharge plan updated successfully.").with("discharge_plan", &plan),
    ))
}

/// Records reviewer, time and notes on the plan itself
pub async fn review_discharge_plan(
    State(state): State<ApiState>,
    Path(plan_id): Path<String>,
    user: CurrentUser,
    body: Result<JsonBody, ApiError>,
) -> ApiResult<Json<MessageResponse>> {
    user.require("discharge_plan:review")?;
    let mut plan = plan_or_404(&state, &plan_id).await?;
    let notes = body
        .ok()
        .and_then(|b| b.text_lossy("review_notes"))
        .unwrap_or_else(|| "Reviewed".to_string());

    plan.reviewed_by_user_id = Some(user.id());
    plan.reviewed_at = Some(Utc::now());
    plan.review_notes = Some(notes);
    let plan = state.db().save_discharge_plan(&plan).await?;
    info!(
        "Discharge plan {} reviewed by user {}. Notes: {}",
        plan.id,
        user.id(),
        plan.review_notes.as_deref().unwrap_or("")
    );

    Ok(Json(
        MessageResponse::new("Discharge plan review recorded.")
            .with("plan_id", &plan.id)
            .with("discharge_plan", &plan),
    ))
}

pub async fn delete_discharge_plan(
    State(state): State<ApiState>,
    Path(plan_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    user.require("discharge_plan:delete")?;
    let plan = plan_or_404(&state, &plan_id).await?;
    if plan.created_by_user_id != Some(user.id()) && !user.has("discharge_plan:delete:any") {
        return Err(forbidden("Unauthorized to delete this discharge plan."));
    }
    state.db().delete_discharge_plan(&plan.id).await?;
    info!("Discharge plan {} deleted by user {}", plan.id, user.id());
    Ok(message("Discharge plan deleted successfully."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn consult_flags_only_accept_booleans() {
        let mut plan = blank_plan("p1".into(), 4);
        let body = JsonBody(json!({
            "social_work_consult_ordered": true,
            "nutrition_consult_ordered": "yes",
            "discharge_goals": "Home with PT",
            "equipment_needed": null,
        }));
        plan.equipment_needed = Some("Walker".into());
        apply_plan_fields(&mut plan, &body);
        assert!(plan.social_work_consult_ordered);
        assert!(!plan.nutrition_consult_ordered);
        assert_eq!(plan.discharge_goals.as_deref(), Some("Home with PT"));
        assert!(plan.equipment_needed.is_none());
    }
}
