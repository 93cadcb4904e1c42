//! Patient safety flags

use super::{bad_request, forbidden};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{CurrentUser, JsonBody};
use crate::api::handlers::{datetime_field, nullable_text};
use crate::api::responses::{created, paged, MessageResponse};
use crate::api::ApiState;
use crate::core::PaginationQuery;
use crate::models::PatientFlag;
use crate::repositories::FlagFilter;
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

#[derive(Debug, Default, Deserialize)]
pub struct FlagQuery {
    pub active_only: Option<String>,
    pub flag_type: Option<String>,
    pub severity: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationQuery,
}

impl FlagQuery {
    fn filter(&self) -> FlagFilter {
        FlagFilter {
            active_only: self
                .active_only
                .as_deref()
                .map_or(true, |a| a.eq_ignore_ascii_case("true")),
            flag_type: self.flag_type.clone().filter(|t| !t.is_empty()),
            severity: self.severity.clone().filter(|s| !s.is_empty()),
        }
    }
}

fn message_400(text: &str) -> ApiError {
    ApiError::message(StatusCode::BAD_REQUEST, text)
}

async fn flag_or_404(state: &ApiState, flag_id: &str) -> ApiResult<PatientFlag> {
    state.db().find_patient_flag(flag_id).await?.ok_or(ApiError::NotFound)
}

fn flag_response(text: &str, flag: &PatientFlag) -> Json<MessageResponse> {
    Json(MessageResponse::new(text).with("flag", flag))
}

pub async fn create_flag(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    user.require("flag:create")?;
    if !state.db().patient_exists(&patient_id).await? {
        return Err(ApiError::NotFound);
    }
    let Some(flag_type) = body.text_lossy("flag_type") else {
        return Err(message_400("flag_type is required."));
    };
    let expires_at = datetime_field(&body, "expires_at", || {
        message_400("Invalid expires_at format. Use ISO format or null.")
    })?;
    let now = Utc::now();

    let flag = state
        .db()
        .insert_patient_flag(&PatientFlag {
            id: Uuid::new_v4().to_string(),
            patient_id,
            patient_name: None,
            flagged_by_user_id: user.id(),
            flagged_by_username: None,
            flag_type,
            severity: body.text_lossy("severity"),
            notes: body.text_lossy("notes"),
            is_active: body.flag("is_active").unwrap_or(true),
            expires_at,
            reviewed_by_user_id: None,
            reviewed_by_username: None,
            reviewed_at: None,
            review_notes: None,
            created_at: now,
            updated_at: now,
        })
        .await?;
    info!("Flag {} ({}) raised on patient {} by user {}", flag.id, flag.flag_type, flag.patient_id, user.id());

    Ok(created(
        MessageResponse::new("Flag created successfully").with("flag", &flag),
    ))
}

pub async fn get_flag(
    State(state): State<ApiState>,
    Path(flag_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<PatientFlag>> {
    user.require("flag:read")?;
    Ok(Json(flag_or_404(&state, &flag_id).await?))
}

/// Active flags first, newest first; `active_only` defaults to true
pub async fn list_flags(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    Query(params): Query<FlagQuery>,
) -> ApiResult<Json<Value>> {
    user.require("flag:read")?;
    if !state.db().patient_exists(&patient_id).await? {
        return Err(ApiError::NotFound);
    }
    let page = state
        .db()
        .list_patient_flags(&patient_id, &params.filter(), params.pagination.resolve(20))
        .await?;
    paged("flags", page)
}

pub async fn update_flag(
    State(state): State<ApiState>,
    Path(flag_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<Json<MessageResponse>> {
    user.require("flag:update")?;
    let mut flag = flag_or_404(&state, &flag_id).await?;
    if flag.flagged_by_user_id != user.id() && !user.has("flag:update:any") {
        return Err(forbidden("Unauthorized to update this flag."));
    }
    if body.is_empty() {
        return Err(bad_request("No update data provided."));
    }

    if let Some(flag_type) = body.text_lossy("flag_type") {
        flag.flag_type = flag_type;
    }
    for (key, slot) in [("severity", &mut flag.severity), ("notes", &mut flag.notes)] {
        if let Some(value) = nullable_text(&body, key) {
            *slot = value;
        }
    }
    if body.has("expires_at") {
        flag.expires_at = datetime_field(&body, "expires_at", || {
            message_400("Invalid expires_at format for update.")
        })?;
    }
    if let Some(active) = body.flag("is_active") {
        flag.is_active = active;
        if !active && flag.reviewed_at.is_none() {
            let reason = body
                .text_lossy("deactivation_reason")
                .unwrap_or_else(|| "Deactivated during update.".to_string());
            flag.mark_reviewed(user.id(), reason, Utc::now());
        }
    }

    let flag = state.db().save_patient_flag(&flag).await?;
    info!("Flag {} updated by user {}", flag.id, user.id());
    Ok(flag_response("Flag updated successfully", &flag))
}

pub async fn review_flag(
    State(state): State<ApiState>,
    Path(flag_id): Path<String>,
    user: CurrentUser,
    body: Result<JsonBody, ApiError>,
) -> ApiResult<Json<MessageResponse>> {
    user.require("flag:review")?;
    let mut flag = flag_or_404(&state, &flag_id).await?;
    if flag.flagged_by_user_id == user.id() && !user.has("flag:review:own") {
        return Err(forbidden("Cannot review a flag you created without specific permission."));
    }

    let notes = body
        .ok()
        .and_then(|b| b.text_lossy("review_notes"))
        .unwrap_or_else(|| "Reviewed.".to_string());
    flag.mark_reviewed(user.id(), notes, Utc::now());
    let flag = state.db().save_patient_flag(&flag).await?;
    info!("Flag {} reviewed by user {}", flag.id, user.id());
    Ok(flag_response("Flag reviewed successfully", &flag))
}

pub async fn deactivate_flag(
    State(state): State<ApiState>,
    Path(flag_id): Path<String>,
    user: CurrentUser,
    body: Result<JsonBody, ApiError>,
) -> ApiResult<Json<MessageResponse>> {
    user.require("flag:deactivate")?;
    let mut flag = flag_or_404(&state, &flag_id).await?;
    if flag.flagged_by_user_id != user.id() && !user.has("flag:deactivate:any") {
        return Err(forbidden("Unauthorized to deactivate this flag."));
    }
    if !flag.is_active {
        return Err(message_400("Flag is already inactive."));
    }

    let reason = body
        .ok()
        .and_then(|b| b.text_lossy("deactivation_reason"))
        .unwrap_or_else(|| "Deactivated.".to_string());
    flag.deactivate(user.id(), &reason, Utc::now());
    let flag = state.db().save_patient_flag(&flag).await?;
    info!("Flag {} deactivated by user {}", flag.id, user.id());
    Ok(flag_response("Flag deactivated successfully", &flag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_only_defaults_to_true() {
        assert!(FlagQuery::default().filter().active_only);
        let query = FlagQuery {
            active_only: Some("false".into()),
            severity: Some(String::new()),
            ..Default::default()
        };
        let filter = query.filter();
        assert!(!filter.active_only);
        assert!(filter.severity.is_none());
    }
}
