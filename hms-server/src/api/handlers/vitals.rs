//! Vital sign charting. Every observation is returned with its derived scores.

use super::super::error::{ApiError, ApiResult};
use super::super::extract::{CurrentUser, JsonBody};
use super::super::responses::paged;
use super::super::ApiState;
use super::datetime_field;
use crate::core::types::{parse_datetime_or_date, value_as_f64};
use crate::core::PaginationQuery;
use crate::models::{VitalMeasurements, VitalSign};
use crate::services::scoring::VitalView;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

const RECORDED_AT_FORMAT: &str =
    "Invalid recorded_at format. Use ISO format (YYYY-MM-DDTHH:MM:SS or YYYY-MM-DDTHH:MM:SS.ffffff).";

#[derive(Debug, Default, Deserialize)]
pub struct VitalListQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationQuery,
}

fn bad_request(text: &str) -> ApiError {
    ApiError::message(StatusCode::BAD_REQUEST, text)
}

fn int_value(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .and_then(|v| i32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Copy every measurement key present in `body` onto `m`.
///
/// An unparseable number clears the field when `keep_invalid` is false and
/// leaves the stored value alone when it is true.
fn apply_measurements(m: &mut VitalMeasurements, body: &JsonBody, keep_invalid: bool) {
    let floats = [
        ("temperature_celsius", &mut m.temperature_celsius),
        ("oxygen_saturation_percent", &mut m.oxygen_saturation_percent),
        ("weight_kg", &mut m.weight_kg),
        ("height_cm", &mut m.height_cm),
        ("blood_glucose_mmol_l", &mut m.blood_glucose_mmol_l),
        ("o2_flow_rate_lpm", &mut m.o2_flow_rate_lpm),
        ("fio2_percent", &mut m.fio2_percent),
        ("troponin_ng_l", &mut m.troponin_ng_l),
        ("creatinine_umol_l", &mut m.creatinine_umol_l),
    ];
    for (key, slot) in floats {
        let Some(raw) = body.0.get(key) else { continue };
        match value_as_f64(raw) {
            Some(v) => *slot = Some(v),
            None if keep_invalid && !raw.is_null() => {}
            None => *slot = None,
        }
    }

    let ints = [
        ("heart_rate_bpm", &mut m.heart_rate_bpm),
        ("respiratory_rate_rpm", &mut m.respiratory_rate_rpm),
        ("systolic_bp_mmhg", &mut m.systolic_bp_mmhg),
        ("diastolic_bp_mmhg", &mut m.diastolic_bp_mmhg),
        ("pain_score_0_10", &mut m.pain_score_0_10),
        ("blood_glucose_mg_dl", &mut m.blood_glucose_mg_dl),
    ];
    for (key, slot) in ints {
        let Some(raw) = body.0.get(key) else { continue };
        match int_value(raw) {
            Some(v) => *slot = Some(v),
            None if keep_invalid && !raw.is_null() => {}
            None => *slot = None,
        }
    }

    let texts = [
        ("blood_glucose_type", &mut m.blood_glucose_type),
        ("consciousness_level", &mut m.consciousness_level),
        ("patient_position", &mut m.patient_position),
        ("activity_level", &mut m.activity_level),
        ("o2_therapy_device", &mut m.o2_therapy_device),
        ("ecg_changes", &mut m.ecg_changes),
        ("notes", &mut m.notes),
    ];
    for (key, slot) in texts {
        if let Some(raw) = body.0.get(key) {
            *slot = match raw {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            };
        }
    }
}

fn recorded_at(body: &JsonBody, invalid: &str) -> ApiResult<Option<DateTime<Utc>>> {
    datetime_field(body, "recorded_at", || bad_request(invalid))
}

fn window_bound(raw: Option<&str>, invalid: &str) -> ApiResult<Option<DateTime<Utc>>> {
    match raw.filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(r) => parse_datetime_or_date(r).map(Some).ok_or_else(|| bad_request(invalid)),
    }
}

async fn vital_or_404(state: &ApiState, vital_id: &str) -> ApiResult<VitalSign> {
    state.db().find_vital_sign(vital_id).await?.ok_or(ApiError::NotFound)
}

/// Recorder, or anyone holding the `:any` variant of the permission
fn ensure_may_modify(user: &CurrentUser, vital: &VitalSign, any_permission: &str, denied: &str) -> ApiResult<()> {
    if vital.recorded_by_user_id == Some(user.id()) || user.has(any_permission) {
        Ok(())
    } else {
        Err(ApiError::message(StatusCode::FORBIDDEN, denied))
    }
}

pub async fn create_vital(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<VitalView>)> {
    user.require("vitals:record")?;
    if !state.db().patient_exists(&patient_id).await? {
        return Err(ApiError::NotFound);
    }
    if body.is_empty() {
        return Err(bad_request("No data provided."));
    }

    let recorded_at = recorded_at(&body, RECORDED_AT_FORMAT)?.unwrap_or_else(Utc::now);
    let mut measurements = VitalMeasurements::default();
    apply_measurements(&mut measurements, &body, false);

    let vital = state
        .db()
        .insert_vital_sign(&patient_id, recorded_at, user.id(), &measurements)
        .await?;
    info!("Vital signs {} recorded for patient {} by user {}", vital.id, patient_id, user.id());
    Ok((StatusCode::CREATED, Json(VitalView::from(vital))))
}

pub async fn list_vitals(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    Query(params): Query<VitalListQuery>,
) -> ApiResult<Json<Value>> {
    user.require("vitals:read")?;
    if !state.db().patient_exists(&patient_id).await? {
        return Err(ApiError::NotFound);
    }
    let start = window_bound(params.start_date.as_deref(), "Invalid start_date format. Use ISO format.")?;
    let end = window_bound(params.end_date.as_deref(), "Invalid end_date format. Use ISO format.")?;

    let page = state
        .db()
        .list_vital_signs(&patient_id, start, end, params.pagination.resolve(30))
        .await?
        .map(VitalView::from);
    paged("vitals", page)
}

pub async fn latest_vitals(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<VitalView>> {
    user.require("vitals:read")?;
    if !state.db().patient_exists(&patient_id).await? {
        return Err(ApiError::NotFound);
    }
    state
        .db()
        .latest_vital_sign(&patient_id)
        .await?
        .map(|vital| Json(VitalView::from(vital)))
        .ok_or_else(|| ApiError::message(StatusCode::NOT_FOUND, "No vital signs recorded for this patient."))
}

pub async fn get_vital(
    State(state): State<ApiState>,
    Path(vital_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<VitalView>> {
    user.require("vitals:read")?;
    Ok(Json(vital_or_404(&state, &vital_id).await?.into()))
}

pub async fn derived_scores(
    State(state): State<ApiState>,
    Path(vital_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<VitalView>> {
    user.require("vitals:read:derived_scores")?;
    Ok(Json(vital_or_404(&state, &vital_id).await?.into()))
}

pub async fn update_vital(
    State(state): State<ApiState>,
    Path(vital_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<Json<VitalView>> {
    user.require("vitals:update")?;
    let mut vital = vital_or_404(&state, &vital_id).await?;
    ensure_may_modify(&user, &vital, "vitals:update:any", "Unauthorized to update this vital signs entry.")?;
    if body.is_empty() {
        return Err(bad_request("No update data provided."));
    }

    if let Some(at) = recorded_at(&body, "Invalid recorded_at format.")? {
        vital.recorded_at = at;
    }
    apply_measurements(&mut vital.measurements, &body, true);
    vital.updated_at = Utc::now();

    state.db().save_vital_sign(&vital).await?;
    info!("Vital signs {} updated by user {}", vital.id, user.id());
    Ok(Json(vital.into()))
}

pub async fn delete_vital(
    State(state): State<ApiState>,
    Path(vital_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<StatusCode> {
    user.require("vitals:delete")?;
    let vital = vital_or_404(&state, &vital_id).await?;
    ensure_may_modify(&user, &vital, "vitals:delete:any", "Unauthorized to delete this vital signs entry.")?;

    state.db().delete_vital_sign(&vital.id).await?;
    info!("Vital signs {} deleted by user {}", vital.id, user.id());
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_clears_unparseable_numbers() {
        let body = JsonBody(json!({
            "heart_rate_bpm": "88",
            "temperature_celsius": 38.6,
            "systolic_bp_mmhg": "high",
            "consciousness_level": "Voice",
        }));
        let mut m = VitalMeasurements::default();
        apply_measurements(&mut m, &body, false);
        assert_eq!(m.heart_rate_bpm, Some(88));
        assert_eq!(m.temperature_celsius, Some(38.6));
        assert_eq!(m.systolic_bp_mmhg, None);
        assert_eq!(m.consciousness_level.as_deref(), Some("Voice"));
    }

    #[test]
    fn update_keeps_old_value_on_bad_input_but_honours_null() {
        let mut m = VitalMeasurements {
            heart_rate_bpm: Some(70),
            weight_kg: Some(80.0),
            notes: Some("stable".into()),
            ..Default::default()
        };
        let body = JsonBody(json!({ "heart_rate_bpm": "fast", "weight_kg": null, "respiratory_rate_rpm": 18.0 }));
        apply_measurements(&mut m, &body, true);
        assert_eq!(m.heart_rate_bpm, Some(70));
        assert_eq!(m.weight_kg, None);
        assert_eq!(m.respiratory_rate_rpm, Some(18));
        assert_eq!(m.notes.as_deref(), Some("stable"));
    }

    #[test]
    fn window_bounds_accept_dates_and_reject_junk() {
        assert!(window_bound(Some("2024-03-01"), "bad").unwrap().is_some());
        assert!(window_bound(Some(""), "bad").unwrap().is_none());
        assert!(window_bound(Some("yesterday"), "bad").is_err());
    }
}
