//! Physician rounding notes

use super::{bad_request, forbidden, query_bound};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{CurrentUser, JsonBody};
use crate::api::handlers::{datetime_field, nullable_text};
use crate::api::responses::{paged, MessageResponse};
use crate::api::ApiState;
use crate::core::PaginationQuery;
use crate::models::RoundingNote;
use crate::repositories::RoundingNoteFilter;
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
pub struct RoundingQuery {
    pub patient_id: Option<String>,
    pub rounding_physician_id: Option<String>,
    pub is_finalized: Option<String>,
    pub priority: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationQuery,
}

impl RoundingQuery {
    fn physician_id(&self) -> ApiResult<Option<i32>> {
        match self.rounding_physician_id.as_deref().filter(|p| !p.is_empty()) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| bad_request("Invalid rounding_physician_id filter.")),
        }
    }
}

async fn note_or_404(state: &ApiState, note_id: &str) -> ApiResult<RoundingNote> {
    state.db().find_rounding_note(note_id).await?.ok_or(ApiError::NotFound)
}

fn note_response(text: &str, note: &RoundingNote) -> Json<MessageResponse> {
    Json(MessageResponse::new(text).with("rounding_note", note))
}

pub async fn create_rounding_note(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<RoundingNote>)> {
    user.require("rounding_note:create")?;
    if body.is_empty() {
        return Err(bad_request("No data provided."));
    }
    if !state.db().patient_exists(&patient_id).await? {
        return Err(ApiError::error(StatusCode::NOT_FOUND, "Patient not found."));
    }

    let physician_id = match body.get("rounding_physician_id") {
        None => Some(user.id()),
        Some(_) => body.int("rounding_physician_id").and_then(|id| i32::try_from(id).ok()),
    };
    let physician = match physician_id {
        Some(id) => state.db().find_user_by_id(id).await?,
        None => None,
    }
    .ok_or_else(|| bad_request("Specified rounding_physician_id not found."))?;

    let rounding_datetime = datetime_field(&body, "rounding_datetime", || {
        bad_request("Invalid rounding_datetime format. Use ISO format.")
    })?
    .unwrap_or_else(Utc::now);
    let now = Utc::now();

    let note = state
        .db()
        .insert_rounding_note(&RoundingNote {
            id: Uuid::new_v4().to_string(),
            patient_id,
            patient_name: None,
            rounding_physician_id: physician.id,
            rounding_physician_username: None,
            rounding_datetime,
            subjective: body.text_lossy("subjective"),
            objective: body.text_lossy("objective"),
            assessment: body.text_lossy("assessment"),
            plan: body.text_lossy("plan"),
            is_finalized: body.flag("is_finalized").unwrap_or(false),
            reviewed_by_id: None,
            reviewed_by_username: None,
            reviewed_at: None,
            review_notes: None,
            priority: body.text_lossy("priority"),
            duration_minutes: body.int("duration_minutes").and_then(|d| i32::try_from(d).ok()),
            location: body.text_lossy("location"),
            created_at: now,
            updated_at: now,
        })
        .await?;
    info!("Rounding note {} created for patient {} by user {}", note.id, note.patient_id, user.id());
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get_rounding_note(
    State(state): State<ApiState>,
    Path(note_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<RoundingNote>> {
    user.require("rounding_note:read")?;
    let note = note_or_404(&state, &note_id).await?;
    let involved = note.rounding_physician_id == user.id() || note.reviewed_by_id == Some(user.id());
    if !involved && !user.has("rounding_note:read:any") {
        return Err(forbidden("Unauthorized to view this rounding note."));
    }
    Ok(Json(note))
}

pub async fn list_patient_rounding_notes(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    Query(params): Query<RoundingQuery>,
) -> ApiResult<Json<Value>> {
    user.require("rounding_note:read")?;
    if !state.db().patient_exists(&patient_id).await? {
        return Err(ApiError::NotFound);
    }

    let filter = RoundingNoteFilter {
        patient_id: Some(patient_id),
        rounding_physician_id: params.physician_id()?,
        is_finalized: params
            .is_finalized
            .as_deref()
            .map(|f| f.eq_ignore_ascii_case("true") || f == "1"),
        priority: params.priority.clone().filter(|p| !p.is_empty()),
        start: query_bound(params.start_date.as_deref(), "Invalid start_date format")?,
        end: query_bound(params.end_date.as_deref(), "Invalid end_date format")?,
    };
    let page = state
        .db()
        .list_rounding_notes(&filter, params.pagination.resolve(20))
        .await?;
    paged("rounding_notes", page)
}

/// Cross-patient listing for supervisors
pub async fn list_all_rounding_notes(
    State(state): State<ApiState>,
    user: CurrentUser,
    Query(params): Query<RoundingQuery>,
) -> ApiResult<Json<Value>> {
    user.require("rounding_note:read:any")?;
    let filter = RoundingNoteFilter {
        patient_id: params.patient_id.clone().filter(|p| !p.is_empty()),
        rounding_physician_id: params.physician_id()?,
        ..Default::default()
    };
    let page = state
        .db()
        .list_rounding_notes(&filter, params.pagination.resolve(20))
        .await?;
    paged("rounding_notes", page)
}

pub async fn update_rounding_note(
    State(state): State<ApiState>,
    Path(note_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<Json<MessageResponse>> {
    user.require("rounding_note:update")?;
    let mut note = note_or_404(&state, &note_id).await?;
    let is_author = note.rounding_physician_id == user.id();
    let can_update_any = user.has("rounding_note:update:any");
    let can_update_finalized = user.has("rounding_note:update:finalized");

    if !is_author && !can_update_any {
        return Err(forbidden("Unauthorized: You are not the author or lack privileges."));
    }
    if note.is_finalized && !(can_update_finalized || can_update_any) {
        return Err(forbidden("Cannot update a finalized note without specific privileges."));
    }
    if body.is_empty() {
        return Err(bad_request("No update data provided."));
    }

    for (key, slot) in [
        ("subjective", &mut note.subjective),
        ("objective", &mut note.objective),
        ("assessment", &mut note.assessment),
        ("plan", &mut note.plan),
        ("priority", &mut note.priority),
        ("location", &mut note.location),
    ] {
        if let Some(value) = nullable_text(&body, key) {
            *slot = value;
        }
    }
    if body.has("duration_minutes") {
        note.duration_minutes = body.int("duration_minutes").and_then(|d| i32::try_from(d).ok());
    }
    if let Some(at) = datetime_field(&body, "rounding_datetime", || {
        bad_request("Invalid rounding_datetime format for update.")
    })? {
        note.rounding_datetime = at;
    }

    match body.flag("is_finalized") {
        Some(true) if !note.is_finalized => {
            if !is_author && !user.has("rounding_note:finalize:any") {
                return Err(forbidden("Unauthorized to finalize this note."));
            }
            note.is_finalized = true;
        }
        Some(false) if note.is_finalized => {
            if !can_update_finalized && !can_update_any {
                return Err(forbidden("Unauthorized to un-finalize this note."));
            }
            note.is_finalized = false;
        }
        _ => {}
    }

    let note = state.db().save_rounding_note(&note).await?;
    info!("Rounding note {} updated by user {}", note.id, user.id());
    Ok(note_response("RoundingNote updated", &note))
}

pub async fn finalize_rounding_note(
    State(state): State<ApiState>,
    Path(note_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    user.require("rounding_note:finalize")?;
    let mut note = note_or_404(&state, &note_id).await?;
    if note.is_finalized {
        return Err(ApiError::message(StatusCode::BAD_REQUEST, "RoundingNote already finalized."));
    }
    if note.rounding_physician_id != user.id() && !user.has("rounding_note:finalize:any") {
        return Err(forbidden(
            "Unauthorized to finalize this note (not author or no 'any' privilege).",
        ));
    }

    note.is_finalized = true;
    let note = state.db().save_rounding_note(&note).await?;
    info!("Rounding note {} finalized by user {}", note.id, user.id());
    Ok(note_response("RoundingNote finalized", &note))
}

pub async fn review_rounding_note(
    State(state): State<ApiState>,
    Path(note_id): Path<String>,
    user: CurrentUser,
    body: Result<JsonBody, ApiError>,
) -> ApiResult<Json<MessageResponse>> {
    user.require("rounding_note:review")?;
    let mut note = note_or_404(&state, &note_id).await?;
    if !note.is_finalized {
        return Err(bad_request("Cannot review a note that is not finalized."));
    }
    if note.rounding_physician_id == user.id() {
        return Err(forbidden("Cannot review your own rounding note."));
    }

    note.reviewed_by_id = Some(user.id());
    note.reviewed_at = Some(Utc::now());
    if let Some(notes) = body.ok().and_then(|b| b.text_lossy("review_notes")) {
        note.review_notes = Some(notes);
    }
    let note = state.db().save_rounding_note(&note).await?;
    info!("Rounding note {} reviewed by user {}", note.id, user.id());
    Ok(note_response("RoundingNote reviewed", &note))
}
