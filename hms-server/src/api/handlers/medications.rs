//! Medication lists, reconciliation and the medication administration record

use super::super::error::{ApiError, ApiResult};
use super::super::extract::{CurrentUser, JsonBody};
use super::super::responses::{created, paged, MessageResponse};
use super::super::ApiState;
use super::{datetime_field, nullable_text};
use crate::core::PaginationQuery;
use crate::models::medication::TYPE_HOME_MED;
use crate::models::{NewPatientMedication, PatientMedication, ReconciliationLog};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct MedicationListQuery {
    #[serde(rename = "type")]
    pub med_type: Option<String>,
    pub status: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationQuery,
}

fn bad_request(text: impl Into<String>) -> ApiError {
    ApiError::message(StatusCode::BAD_REQUEST, text)
}

async fn ensure_patient(state: &ApiState, patient_id: &str) -> ApiResult<()> {
    if state.db().patient_exists(patient_id).await? {
        Ok(())
    } else {
        Err(ApiError::NotFound)
    }
}

pub async fn list_patient_medications(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    Query(params): Query<MedicationListQuery>,
) -> ApiResult<Json<Value>> {
    user.require("medication:read")?;
    ensure_patient(&state, &patient_id).await?;

    let med_type = params.med_type.as_deref().filter(|t| !t.is_empty());
    // "all" lists every status; anything else filters, defaulting to Active
    let status = match params.status.as_deref() {
        None => Some("Active"),
        Some(s) if s.is_empty() || s.eq_ignore_ascii_case("all") => None,
        Some(s) => Some(s),
    };
    let page = state
        .db()
        .list_patient_medications(&patient_id, med_type, status, params.pagination.resolve(20))
        .await?;
    paged("medications", page)
}

pub async fn add_home_medication(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    user.require("medication:manage_home_meds")?;
    ensure_patient(&state, &patient_id).await?;
    if body.is_empty() {
        return Err(bad_request("No data provided"));
    }

    let (Some(name), Some(dose), Some(route), Some(frequency)) = (
        body.text_lossy("medication_name"),
        body.text_lossy("dose"),
        body.text_lossy("route"),
        body.text_lossy("frequency"),
    ) else {
        return Err(bad_request(
            "Missing required fields: medication_name, dose, route, frequency",
        ));
    };

    let last_taken = datetime_field(&body, "last_taken_datetime", || {
        bad_request("Invalid last_taken_datetime format. Use ISO format.")
    })?;
    let start = datetime_field(&body, "start_datetime", || {
        bad_request("Invalid start_datetime format. Use ISO format.")
    })?
    .unwrap_or_else(Utc::now);

    let medication = state
        .db()
        .insert_patient_medication(&NewPatientMedication {
            patient_id: patient_id.clone(),
            orderable_item_id: body.text_lossy("orderable_item_id"),
            medication_name: name,
            med_type: TYPE_HOME_MED,
            dose: Some(dose),
            route: Some(route),
            frequency: Some(frequency),
            prn_reason: body.text("prn_reason").map(String::from),
            indication: body.text("indication").map(String::from),
            start_datetime: start,
            source_of_information: Some(body.text("source_of_information").unwrap_or("Patient").to_string()),
            last_taken_datetime: last_taken,
            recorded_by_user_id: Some(user.id()),
            source_order_id: None,
        })
        .await?;
    info!("Home medication {} recorded for patient {}", medication.id, patient_id);

    Ok(created(
        MessageResponse::new("Home medication added successfully").with("medication", &medication),
    ))
}

pub async fn update_medication(
    State(state): State<ApiState>,
    Path(medication_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<Json<MessageResponse>> {
    user.require("medication:update")?;
    let mut medication = state
        .db()
        .find_patient_medication(&medication_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if body.is_empty() {
        return Err(bad_request("No update data provided"));
    }

    apply_medication_update(&mut medication, &body)?;
    state.db().save_patient_medication(&medication).await?;
    let medication = state
        .db()
        .find_patient_medication(&medication_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    info!("Medication {} updated by user {}", medication.id, user.id());

    Ok(Json(
        MessageResponse::new("Medication record updated").with("medication", &medication),
    ))
}

fn apply_medication_update(medication: &mut PatientMedication, body: &JsonBody) -> ApiResult<()> {
    if let Some(name) = body.text_lossy("medication_name") {
        medication.medication_name = name;
    }
    let text_fields = [
        ("dose", &mut medication.dose),
        ("route", &mut medication.route),
        ("frequency", &mut medication.frequency),
        ("indication", &mut medication.indication),
        ("prn_reason", &mut medication.prn_reason),
    ];
    for (key, slot) in text_fields {
        if let Some(value) = nullable_text(body, key) {
            *slot = value;
        }
    }
    if let Some(status) = body.text("status") {
        medication.status = status.to_string();
    }
    let home_med = medication.is_home_med();
    if home_med {
        if let Some(source) = nullable_text(body, "source_of_information") {
            medication.source_of_information = source;
        }
    }

    let invalid = |field: &str| ApiError::bad_request(format!("Invalid {} format.", field));
    if let Some(start) = datetime_field(body, "start_datetime", || invalid("start_datetime"))? {
        medication.start_datetime = start;
    }
    if body.has("end_datetime") {
        medication.end_datetime = datetime_field(body, "end_datetime", || invalid("end_datetime"))?;
    }
    if home_med && body.has("last_taken_datetime") {
        medication.last_taken_datetime =
            datetime_field(body, "last_taken_datetime", || invalid("last_taken_datetime"))?;
    }
    Ok(())
}

pub async fn reconcile_medications(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    user.require("medication:reconcile")?;
    ensure_patient(&state, &patient_id).await?;

    let (Some(reconciliation_type), Some(decisions)) = (
        body.text("reconciliation_type"),
        body.get("decisions_log").filter(|d| d.is_array()),
    ) else {
        return Err(bad_request(
            "reconciliation_type (string) and decisions_log (array) are required.",
        ));
    };

    let log_id = state
        .db()
        .insert_reconciliation_log(&patient_id, reconciliation_type, user.id(), decisions, body.text("notes"))
        .await?;
    info!("{} reconciliation {} logged for patient {}", reconciliation_type, log_id, patient_id);

    Ok(created(
        MessageResponse::new(format!("{} reconciliation logged successfully", reconciliation_type))
            .with("log_id", log_id),
    ))
}

pub async fn list_reconciliation_logs(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<ReconciliationLog>>> {
    user.require("medication:reconcile:read_log")?;
    ensure_patient(&state, &patient_id).await?;
    Ok(Json(state.db().list_reconciliation_logs(&patient_id).await?))
}

pub async fn document_administration(
    State(state): State<ApiState>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<Value>)> {
    user.require("mar:document_administration")?;
    let (Some(medication_id), Some(status)) = (body.text_lossy("patient_medication_id"), body.text("status")) else {
        return Err(ApiError::bad_request("patient_medication_id and status are required."));
    };
    let medication = state
        .db()
        .find_patient_medication(&medication_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let administered_at = datetime_field(&body, "administration_time", || {
        ApiError::bad_request("Invalid administration_time format.")
    })?
    .unwrap_or_else(Utc::now);
    let dose_given = body.text_lossy("dose_given").or_else(|| medication.dose.clone());

    let record = state
        .db()
        .insert_administration(
            &medication,
            user.id(),
            administered_at,
            status,
            dose_given.as_deref(),
            body.text("notes"),
        )
        .await?;
    info!(
        "Administration {} ({}) documented for medication {} by user {}",
        record.id, record.status, medication.id, user.id()
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Medication administration documented successfully.",
            "administration_record": record,
        })),
    ))
}

pub async fn get_patient_mar(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    Query(pagination): Query<PaginationQuery>,
) -> ApiResult<Json<Value>> {
    user.require("mar:read")?;
    ensure_patient(&state, &patient_id).await?;
    let page = state
        .db()
        .list_administrations(&patient_id, pagination.resolve(50))
        .await?;
    paged("mar_records", page)
}
