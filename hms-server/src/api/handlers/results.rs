//! Lab results and imaging reports

use super::super::error::{ApiError, ApiResult};
use super::super::extract::{CurrentUser, JsonBody};
use super::super::responses::{created, MessageResponse};
use super::super::ApiState;
use super::datetime_field;
use crate::core::types::value_to_display;
use crate::models::result::numeric_value;
use crate::models::{ImagingReport, LabResult, NewImagingReport, NewLabResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct LabQuery {
    pub test_name: Option<String>,
}

fn bad_request(text: &str) -> ApiError {
    ApiError::message(StatusCode::BAD_REQUEST, text)
}

async fn ensure_patient(state: &ApiState, patient_id: &str) -> ApiResult<crate::models::Patient> {
    state.db().find_patient(patient_id).await?.ok_or(ApiError::NotFound)
}

/// `Potassium: 6.8 mmol/L (HH)`
fn lab_display(result: &LabResult) -> String {
    let mut display = format!("{}: {}", result.test_name, result.value.as_deref().unwrap_or(""));
    if let Some(units) = result.units.as_deref().filter(|u| !u.is_empty()) {
        display.push(' ');
        display.push_str(units);
    }
    if let Some(flag) = result.abnormal_flag.as_deref() {
        display.push_str(&format!(" ({})", flag));
    }
    display
}

pub async fn create_lab_result(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    user.require("result:create:lab")?;
    let patient = ensure_patient(&state, &patient_id).await?;

    let (Some(test_name), Some(value), true) = (
        body.text("test_name"),
        body.get("value"),
        body.has("collection_datetime"),
    ) else {
        return Err(bad_request("Missing required fields: test_name, value, collection_datetime"));
    };
    let collected = datetime_field(&body, "collection_datetime", || {
        bad_request(
            "Invalid collection_datetime format. Use ISO format (YYYY-MM-DDTHH:MM:SS or YYYY-MM-DDTHH:MM:SS.ffffff).",
        )
    })?
    .ok_or_else(|| bad_request("Missing required fields: test_name, value, collection_datetime"))?;

    let result = state
        .db()
        .insert_lab_result(&NewLabResult {
            patient_id: patient.id.clone(),
            ordered_test_id: body.text_lossy("ordered_test_id"),
            test_name: test_name.to_string(),
            panel_name: body.text("panel_name").map(String::from),
            value: value_to_display(value),
            value_numeric: numeric_value(value),
            units: body.text("units").map(String::from),
            reference_range: body.text("reference_range").map(String::from),
            abnormal_flag: body.text("abnormal_flag").map(String::from),
            status: body.text("status").unwrap_or("Final").to_string(),
            collection_datetime: collected,
            performing_lab: body.text("performing_lab").map(String::from),
        })
        .await?;
    info!("Lab result {} ({}) recorded for patient {}", result.id, result.test_name, patient.id);

    if result.is_critical() {
        match patient.attending_physician_id {
            Some(attending) => {
                state
                    .notifications
                    .notify_critical_lab_result(&result.id, &patient.id, &lab_display(&result), vec![attending])
                    .await
            }
            None => warn!(
                "Critical lab result {} for patient {} has no attending physician to notify",
                result.id, patient.id
            ),
        }
    }

    Ok(created(
        MessageResponse::new("Lab result created successfully").with("result_id", &result.id),
    ))
}

pub async fn list_lab_results(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    Query(params): Query<LabQuery>,
) -> ApiResult<Json<Vec<LabResult>>> {
    user.require("result:read:lab")?;
    ensure_patient(&state, &patient_id).await?;
    let test_name = params.test_name.as_deref().filter(|t| !t.is_empty());
    Ok(Json(state.db().list_lab_results(&patient_id, test_name).await?))
}

pub async fn create_imaging_report(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    user.require("result:create:imaging")?;
    let patient = ensure_patient(&state, &patient_id).await?;

    let (Some(modality), Some(description), Some(report_text)) = (
        body.text("modality"),
        body.text("study_description"),
        body.text("report_text"),
    ) else {
        return Err(bad_request("Missing required fields"));
    };
    let study_datetime = datetime_field(&body, "study_datetime", || {
        bad_request("Invalid study_datetime format. Use ISO format.")
    })?
    .ok_or_else(|| bad_request("Missing required fields"))?;

    let report = state
        .db()
        .insert_imaging_report(&NewImagingReport {
            patient_id: patient.id,
            ordered_study_id: body.text_lossy("ordered_study_id"),
            modality: modality.to_string(),
            study_description: description.to_string(),
            study_datetime,
            report_text: report_text.to_string(),
            impression_text: body.text("impression_text").map(String::from),
            status: body.text("status").unwrap_or("Final").to_string(),
            reported_by_user_id: user.id(),
        })
        .await?;

    Ok(created(
        MessageResponse::new("Imaging report created successfully").with("report_id", &report.id),
    ))
}

pub async fn list_imaging_reports(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<ImagingReport>>> {
    user.require("result:read:imaging")?;
    ensure_patient(&state, &patient_id).await?;
    Ok(Json(state.db().list_imaging_reports(&patient_id).await?))
}

pub async fn acknowledge_lab_result(
    State(state): State<ApiState>,
    Path(result_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    user.require("result:acknowledge:lab")?;
    let result = state
        .db()
        .find_lab_result(&result_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if result.acknowledged_at.is_some() {
        return Err(bad_request("Lab result already acknowledged."));
    }

    let now = Utc::now();
    state.db().acknowledge_lab_result(&result.id, user.id(), now).await?;
    Ok(Json(
        MessageResponse::new("Lab result acknowledged successfully.").with("acknowledged_at", now),
    ))
}

pub async fn acknowledge_imaging_report(
    State(state): State<ApiState>,
    Path(report_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    user.require("result:acknowledge:imaging")?;
    let report = state
        .db()
        .find_imaging_report(&report_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if report.acknowledged_at.is_some() {
        return Err(bad_request("Imaging report already acknowledged."));
    }

    let now = Utc::now();
    state.db().acknowledge_imaging_report(&report.id, user.id(), now).await?;
    Ok(Json(
        MessageResponse::new("Imaging report acknowledged successfully.").with("acknowledged_at", now),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_display_includes_units_and_flag() {
        let result = LabResult {
            id: "lab-1".into(),
            patient_id: "p1".into(),
            ordered_test_id: None,
            test_name: "Potassium".into(),
            panel_name: None,
            value: Some("6.8".into()),
            value_numeric: Some(6.8),
            units: Some("mmol/L".into()),
            reference_range: None,
            abnormal_flag: Some("HH".into()),
            status: "Final".into(),
            collection_datetime: Utc::now(),
            result_datetime: Utc::now(),
            performing_lab: None,
            acknowledged_at: None,
            acknowledged_by_user_id: None,
            acknowledged_by_username: None,
        };
        assert_eq!(lab_display(&result), "Potassium: 6.8 mmol/L (HH)");
    }
}
