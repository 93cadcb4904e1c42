//! API request handlers, one module per clinical area

pub mod admin;
pub mod auth;
pub mod care;
pub mod cds;
pub mod health;
pub mod insights;
pub mod medications;
pub mod notifications;
pub mod orders;
pub mod patients;
pub mod results;
pub mod schedule;
pub mod tasks;
pub mod vitals;

use super::error::{ApiError, ApiResult};
use super::extract::JsonBody;
use super::ApiState;
use crate::core::types::{parse_datetime, parse_datetime_or_date};
use crate::models::Patient;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Load a patient or fail with a 404 `{"message": text}`
pub(crate) async fn patient_or_404(
    state: &ApiState,
    patient_id: &str,
    text: &'static str,
) -> ApiResult<Patient> {
    state
        .db()
        .find_patient(patient_id)
        .await?
        .ok_or_else(|| ApiError::message(StatusCode::NOT_FOUND, text))
}

/// Optional timestamp field; an empty string counts as absent and any other
/// unparseable value is a 400
pub(crate) fn datetime_field(
    body: &JsonBody,
    key: &str,
    invalid: impl FnOnce() -> ApiError,
) -> ApiResult<Option<DateTime<Utc>>> {
    match body.get(key) {
        None => Ok(None),
        Some(Value::String(raw)) if raw.is_empty() => Ok(None),
        Some(Value::String(raw)) => parse_datetime(raw).map(Some).ok_or_else(invalid),
        Some(_) => Err(invalid()),
    }
}

/// Like [`datetime_field`] but a bare `YYYY-MM-DD` is midnight UTC
pub(crate) fn date_or_datetime_field(
    body: &JsonBody,
    key: &str,
    invalid: impl FnOnce() -> ApiError,
) -> ApiResult<Option<DateTime<Utc>>> {
    match body.get(key) {
        None => Ok(None),
        Some(Value::String(raw)) if raw.is_empty() => Ok(None),
        Some(Value::String(raw)) => parse_datetime_or_date(raw).map(Some).ok_or_else(invalid),
        Some(_) => Err(invalid()),
    }
}

/// Partial-update value: `None` when absent, `Some(None)` for an explicit null
pub(crate) fn nullable_text(body: &JsonBody, key: &str) -> Option<Option<String>> {
    match body.0.get(key)? {
        Value::Null => Some(None),
        Value::String(s) => Some(Some(s.clone())),
        Value::Number(n) => Some(Some(n.to_string())),
        _ => None,
    }
}
