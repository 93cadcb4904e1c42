//! Appointment scheduling. Every write on these routes must carry a JSON body.

use super::super::error::{ApiError, ApiResult};
use super::super::extract::{CurrentUser, JsonBody};
use super::super::responses::{created, paged, MessageResponse};
use super::super::ApiState;
use super::nullable_text;
use crate::core::types::parse_datetime_or_date;
use crate::core::PaginationQuery;
use crate::models::appointment::{STATUS_CANCELLED_BY_CLINIC, STATUS_SCHEDULED};
use crate::models::{Appointment, AppointmentFilter, NewAppointment};
use crate::services::schedule::{cancellation_note, end_filter, provider_scope, ScopeError, SlotWindow};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

const REQUIRED_FIELDS: [&str; 4] = ["patient_id", "provider_user_id", "start_datetime", "end_datetime"];

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentQuery {
    pub patient_id: Option<String>,
    pub provider_user_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub appointment_type: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationQuery,
}

fn error(status: StatusCode, text: impl Into<String>) -> ApiError {
    ApiError::error(status, text)
}

fn appointment_response(text: impl Into<String>, appointment: &Appointment) -> Json<MessageResponse> {
    Json(MessageResponse::new(text).with("appointment", appointment))
}

async fn appointment_or_404(state: &ApiState, appointment_id: &str) -> ApiResult<Appointment> {
    state
        .db()
        .find_appointment(appointment_id)
        .await?
        .ok_or(ApiError::NotFound)
}

async fn provider_exists(state: &ApiState, provider_id: Option<i64>) -> ApiResult<Option<i32>> {
    let Some(id) = provider_id.and_then(|id| i32::try_from(id).ok()) else {
        return Ok(None);
    };
    Ok(state.db().find_user_by_id(id).await?.map(|user| user.id))
}

pub async fn create_appointment(
    State(state): State<ApiState>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    user.require("appointment:create")?;
    let missing = body.missing(&REQUIRED_FIELDS);
    if !missing.is_empty() {
        return Err(error(
            StatusCode::BAD_REQUEST,
            format!("Missing or empty required fields: {}", missing.join(", ")),
        ));
    }

    let patient_id = body.text_lossy("patient_id").unwrap_or_default();
    if !state.db().patient_exists(&patient_id).await? {
        return Err(error(StatusCode::NOT_FOUND, "Patient not found."));
    }
    let provider_id = provider_exists(&state, body.int("provider_user_id"))
        .await?
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Provider not found."))?;

    let window = SlotWindow::new(
        body.text("start_datetime").and_then(parse_datetime_or_date),
        body.text("end_datetime").and_then(parse_datetime_or_date),
    )
    .ok_or_else(|| {
        error(
            StatusCode::BAD_REQUEST,
            "Invalid or inconsistent start/end datetime. Ensure ISO format and end is after start.",
        )
    })?;
    if state
        .db()
        .find_conflicting_appointment(provider_id, window.start, window.end, None)
        .await?
        .is_some()
    {
        return Err(error(
            StatusCode::CONFLICT,
            "Provider has a conflicting appointment in the selected time slot.",
        ));
    }

    let appointment = state
        .db()
        .insert_appointment(&NewAppointment {
            patient_id,
            provider_user_id: provider_id,
            start_datetime: window.start,
            end_datetime: window.end,
            appointment_type: body.text_lossy("appointment_type"),
            status: body.text("status").unwrap_or(STATUS_SCHEDULED).to_string(),
            location: body.text_lossy("location"),
            reason_for_visit: body.text_lossy("reason_for_visit"),
            notes: body.text_lossy("notes"),
            created_by_user_id: user.id(),
        })
        .await?;
    info!(
        "Appointment {} booked with provider {} from {} to {}",
        appointment.id, provider_id, window.start, window.end
    );

    Ok(created(
        MessageResponse::new("Appointment created successfully.").with("appointment", &appointment),
    ))
}

pub async fn list_appointments(
    State(state): State<ApiState>,
    user: CurrentUser,
    Query(params): Query<AppointmentQuery>,
) -> ApiResult<Json<Value>> {
    user.require("appointment:read")?;
    let provider_user_id = provider_scope(
        params.provider_user_id.as_deref(),
        user.id(),
        user.has("appointment:read:any"),
    )
    .map_err(|e| match e {
        ScopeError::InvalidProvider => error(StatusCode::BAD_REQUEST, "Invalid provider_user_id format."),
        ScopeError::OtherProvider => error(
            StatusCode::FORBIDDEN,
            "Unauthorized to view appointments for other providers.",
        ),
    })?;

    let non_empty = |raw: &Option<String>| raw.clone().filter(|s| !s.is_empty());
    let start_from = match params.start_date.as_deref().filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => Some(
            parse_datetime_or_date(raw)
                .ok_or_else(|| error(StatusCode::BAD_REQUEST, "Invalid start_date filter format."))?,
        ),
    };
    let start_until = match params.end_date.as_deref().filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => Some(
            end_filter(raw).ok_or_else(|| error(StatusCode::BAD_REQUEST, "Invalid end_date filter format."))?,
        ),
    };

    let filter = AppointmentFilter {
        patient_id: non_empty(&params.patient_id),
        provider_user_id,
        start_from,
        start_until,
        status: non_empty(&params.status),
        appointment_type: non_empty(&params.appointment_type),
    };
    let page = state
        .db()
        .list_appointments(&filter, params.pagination.resolve(20))
        .await?;
    paged("appointments", page)
}

pub async fn get_appointment(
    State(state): State<ApiState>,
    Path(appointment_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<Appointment>> {
    user.require("appointment:read")?;
    let appointment = appointment_or_404(&state, &appointment_id).await?;
    if !appointment.involves(user.id()) && !user.has("appointment:read:any") {
        return Err(error(StatusCode::FORBIDDEN, "Unauthorized to view this appointment."));
    }
    Ok(Json(appointment))
}

pub async fn update_appointment(
    State(state): State<ApiState>,
    Path(appointment_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<Json<MessageResponse>> {
    user.require("appointment:update")?;
    let mut appointment = appointment_or_404(&state, &appointment_id).await?;
    if body.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "No update data provided."));
    }
    if !appointment.involves(user.id()) && !user.has("appointment:update:any") {
        return Err(error(StatusCode::FORBIDDEN, "Unauthorized to update this appointment."));
    }

    let new_start = body.text("start_datetime");
    let new_end = body.text("end_datetime");
    let provider_changed = body.get("provider_user_id").is_some();

    let provider_id = if provider_changed {
        provider_exists(&state, body.int("provider_user_id")).await?
    } else {
        provider_exists(&state, Some(i64::from(appointment.provider_user_id))).await?
    }
    .ok_or_else(|| error(StatusCode::NOT_FOUND, "Provider user ID for conflict check not found."))?;

    let start = match new_start {
        Some(raw) => parse_datetime_or_date(raw),
        None => Some(appointment.start_datetime),
    };
    let end = match new_end {
        Some(raw) => parse_datetime_or_date(raw),
        None => Some(appointment.end_datetime),
    };
    let window = SlotWindow::new(start, end).ok_or_else(|| {
        error(StatusCode::BAD_REQUEST, "Invalid or inconsistent start/end datetime for update.")
    })?;

    if (new_start.is_some() || new_end.is_some() || provider_changed)
        && state
            .db()
            .find_conflicting_appointment(provider_id, window.start, window.end, Some(&appointment.id))
            .await?
            .is_some()
    {
        return Err(error(
            StatusCode::CONFLICT,
            "Proposed change conflicts with another appointment for the provider.",
        ));
    }

    appointment.start_datetime = window.start;
    appointment.end_datetime = window.end;
    appointment.provider_user_id = provider_id;
    for (key, slot) in [
        ("appointment_type", &mut appointment.appointment_type),
        ("location", &mut appointment.location),
        ("reason_for_visit", &mut appointment.reason_for_visit),
        ("notes", &mut appointment.notes),
    ] {
        if let Some(value) = nullable_text(&body, key) {
            *slot = value;
        }
    }
    if let Some(status) = body.text("status") {
        appointment.status = status.to_string();
    }

    let appointment = state.db().save_appointment(&appointment).await?;
    info!("Appointment {} updated by user {}", appointment.id, user.id());
    Ok(appointment_response("Appointment updated successfully.", &appointment))
}

pub async fn cancel_appointment(
    State(state): State<ApiState>,
    Path(appointment_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<Json<MessageResponse>> {
    user.require("appointment:cancel")?;
    let mut appointment = appointment_or_404(&state, &appointment_id).await?;
    let reason = body
        .text_lossy("reason")
        .unwrap_or_else(|| "Cancelled by user action.".to_string());

    if !appointment.involves(user.id()) && !user.has("appointment:cancel:any") {
        return Err(error(StatusCode::FORBIDDEN, "Unauthorized to cancel this appointment."));
    }
    if appointment.is_cancelled() {
        return Err(ApiError::Body(
            StatusCode::BAD_REQUEST,
            json!({
                "message": "Appointment already cancelled.",
                "appointment": appointment,
            }),
        ));
    }

    appointment.status = STATUS_CANCELLED_BY_CLINIC.to_string();
    appointment.notes = Some(cancellation_note(&reason, appointment.notes.as_deref(), Utc::now()));
    let appointment = state.db().save_appointment(&appointment).await?;
    info!("Appointment {} cancelled by user {}: {}", appointment.id, user.id(), reason);

    Ok(appointment_response(
        format!("Appointment cancelled successfully ({}).", appointment.status),
        &appointment,
    ))
}
