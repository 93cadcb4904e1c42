//! Patient chart: demographics, allergies, problems and clinical notes

use super::super::error::{ApiError, ApiResult};
use super::super::extract::{Client, CurrentUser, JsonBody};
use super::super::responses::{created, MessageResponse};
use super::super::ApiState;
use super::{date_or_datetime_field, nullable_text, patient_or_404};
use crate::core::types::parse_date;
use crate::models::audit::action;
use crate::models::{
    AllergySummary, AuditEvent, NewPatient, NoteSummary, PatientAllergy, PatientHeader, ProblemListEntry,
};
use crate::services::audit;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;

const PATIENT_NOT_FOUND: &str = "Patient not found";

fn bad_request(text: &str) -> ApiError {
    ApiError::message(StatusCode::BAD_REQUEST, text)
}

pub async fn create_patient(
    State(state): State<ApiState>,
    user: CurrentUser,
    Client(client): Client,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    user.require("patient:create")?;

    let required = ["mrn", "first_name", "last_name", "date_of_birth"];
    if required.iter().any(|field| !body.has(field)) {
        return Err(bad_request(
            "Missing required fields (mrn, first_name, last_name, date_of_birth)",
        ));
    }
    let (Some(mrn), Some(first_name), Some(last_name)) =
        (body.text_lossy("mrn"), body.text("first_name"), body.text("last_name"))
    else {
        return Err(bad_request(
            "Missing required fields (mrn, first_name, last_name, date_of_birth)",
        ));
    };

    if state.db().mrn_exists(&mrn).await? {
        return Err(ApiError::message(
            StatusCode::CONFLICT,
            format!("Patient with MRN {} already exists.", mrn),
        ));
    }

    let date_of_birth = body
        .text("date_of_birth")
        .and_then(parse_date)
        .ok_or_else(|| bad_request("Invalid date_of_birth format or type. Use YYYY-MM-DD string."))?;
    let admission_date = date_or_datetime_field(&body, "admission_date", || {
        bad_request("Invalid admission_date format. Use ISO 8601.")
    })?;

    let history = |key: &str| body.flag(key).unwrap_or(false);
    let new_patient = NewPatient {
        mrn,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        date_of_birth,
        gender: body.text("gender").map(String::from),
        attending_physician_id: body.int("attending_physician_id").map(|id| id as i32),
        code_status: body.text("code_status").unwrap_or("Full Code").to_string(),
        isolation_precautions: body.text("isolation_precautions").map(String::from),
        admission_date,
        known_cad: history("known_cad"),
        congestive_heart_failure: history("congestive_heart_failure"),
        hypertension: history("hypertension"),
        diabetes: history("diabetes"),
        stroke_or_tia: history("stroke_or_tia"),
        vascular_disease: history("vascular_disease"),
        atrial_fibrillation: history("atrial_fibrillation"),
    };

    let patient = match state.db().insert_patient(&new_patient).await {
        Ok(patient) => patient,
        Err(e) if e.is_unique_violation() => {
            return Err(ApiError::message(
                StatusCode::CONFLICT,
                format!("Patient with MRN {} already exists.", new_patient.mrn),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    audit::record(
        state.db(),
        AuditEvent::new(action::PATIENT_CREATE, Some(&user.user), &client)
            .target("Patient", &patient.id)
            .details(json!({
                "message": format!(
                    "New patient '{}' created with MRN {}.",
                    patient.full_name(),
                    patient.mrn
                )
            })),
    )
    .await;
    info!("Patient {} created by user {}", patient.id, user.id());

    Ok(created(
        MessageResponse::new("Patient created successfully").with("patient_id", &patient.id),
    ))
}

pub async fn update_patient(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    Client(client): Client,
    body: JsonBody,
) -> ApiResult<Json<Value>> {
    user.require("patient:update")?;
    let before = patient_or_404(&state, &patient_id, PATIENT_NOT_FOUND).await?;
    if body.is_empty() {
        return Err(bad_request("No update data provided."));
    }

    let mut patient = before.clone();
    if let Some(mrn) = body.text_lossy("mrn") {
        if mrn != before.mrn && state.db().mrn_exists(&mrn).await? {
            return Err(ApiError::message(
                StatusCode::CONFLICT,
                format!("Patient with MRN {} already exists.", mrn),
            ));
        }
        patient.mrn = mrn;
    }
    if let Some(first_name) = body.text("first_name") {
        patient.first_name = first_name.to_string();
    }
    if let Some(last_name) = body.text("last_name") {
        patient.last_name = last_name.to_string();
    }
    if body.has("date_of_birth") {
        patient.date_of_birth = body
            .text("date_of_birth")
            .and_then(parse_date)
            .ok_or_else(|| bad_request("Invalid date_of_birth format or type. Use YYYY-MM-DD string."))?;
    }
    if let Some(gender) = nullable_text(&body, "gender") {
        patient.gender = gender;
    }
    if body.has("attending_physician_id") {
        patient.attending_physician_id = body.int("attending_physician_id").map(|id| id as i32);
    }
    if let Some(code_status) = body.text("code_status") {
        patient.code_status = code_status.to_string();
    }
    if let Some(precautions) = nullable_text(&body, "isolation_precautions") {
        patient.isolation_precautions = precautions;
    }
    if body.has("admission_date") {
        patient.admission_date = date_or_datetime_field(&body, "admission_date", || {
            bad_request("Invalid admission_date format. Use ISO 8601.")
        })?;
    }
    if body.has("discharge_date") {
        patient.discharge_date = date_or_datetime_field(&body, "discharge_date", || {
            bad_request("Invalid discharge_date format. Use ISO 8601.")
        })?;
    }
    let history = [
        ("known_cad", &mut patient.known_cad),
        ("congestive_heart_failure", &mut patient.congestive_heart_failure),
        ("hypertension", &mut patient.hypertension),
        ("diabetes", &mut patient.diabetes),
        ("stroke_or_tia", &mut patient.stroke_or_tia),
        ("vascular_disease", &mut patient.vascular_disease),
        ("atrial_fibrillation", &mut patient.atrial_fibrillation),
    ];
    for (key, slot) in history {
        if let Some(value) = body.flag(key) {
            *slot = value;
        }
    }

    let saved = state.db().save_patient(&patient).await?;
    if let Some(changes) = audit::patient_changes(&before, &saved) {
        audit::record(
            state.db(),
            AuditEvent::new(action::PATIENT_UPDATE, Some(&user.user), &client)
                .target("Patient", &saved.id)
                .details(changes),
        )
        .await;
    }

    Ok(Json(json!({
        "message": "Patient updated successfully",
        "patient": saved,
    })))
}

pub async fn get_patient_header(
    State(state): State<ApiState>,
    Path(identifier): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<PatientHeader>> {
    user.require("patient:read")?;
    let patient = state
        .db()
        .find_patient_by_identifier(&identifier)
        .await?
        .ok_or_else(|| ApiError::message(StatusCode::NOT_FOUND, PATIENT_NOT_FOUND))?;
    let allergens = state.db().active_allergen_names(&patient.id).await?;

    Ok(Json(PatientHeader {
        age: patient.age(),
        full_name: patient.full_name(),
        patient_id: patient.id,
        mrn: patient.mrn,
        date_of_birth: patient.date_of_birth,
        gender: patient.gender,
        attending_physician_id: patient.attending_physician_id,
        code_status: patient.code_status,
        isolation_precautions: patient.isolation_precautions,
        allergies_summary: AllergySummary::from_names(allergens),
    }))
}

pub async fn add_allergy(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    user.require("patient:update")?;
    patient_or_404(&state, &patient_id, PATIENT_NOT_FOUND).await?;
    let allergen = body
        .text("allergen_name")
        .ok_or_else(|| bad_request("allergen_name is required"))?;

    let allergy = state
        .db()
        .insert_allergy(
            &patient_id,
            allergen,
            body.text("reaction_description"),
            body.text("severity").unwrap_or("Unknown"),
            user.id(),
        )
        .await?;
    Ok(created(
        MessageResponse::new("Allergy added successfully")
            .with("allergy_id", &allergy.id)
            .with("allergy", &allergy),
    ))
}

pub async fn list_allergies(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<PatientAllergy>>> {
    user.require("patient:read")?;
    patient_or_404(&state, &patient_id, PATIENT_NOT_FOUND).await?;
    Ok(Json(state.db().list_allergies(&patient_id).await?))
}

pub async fn add_problem(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    user.require("patient:update")?;
    patient_or_404(&state, &patient_id, PATIENT_NOT_FOUND).await?;
    let description = body
        .text("problem_description")
        .ok_or_else(|| bad_request("problem_description is required"))?;
    let onset_date = match body.get("onset_date") {
        None => None,
        Some(_) => Some(
            body.text("onset_date")
                .and_then(parse_date)
                .ok_or_else(|| bad_request("Invalid onset_date format. Use YYYY-MM-DD."))?,
        ),
    };

    let problem = state
        .db()
        .insert_problem(
            &patient_id,
            body.text("icd10_code"),
            description,
            onset_date,
            body.text("status").unwrap_or("Active"),
            user.id(),
        )
        .await?;
    Ok(created(
        MessageResponse::new("Problem added successfully")
            .with("problem_id", &problem.id)
            .with("problem", &problem),
    ))
}

pub async fn list_problems(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<ProblemListEntry>>> {
    user.require("patient:read")?;
    patient_or_404(&state, &patient_id, PATIENT_NOT_FOUND).await?;
    Ok(Json(state.db().list_problems(&patient_id).await?))
}

pub async fn create_note(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    user.require("note:create")?;
    patient_or_404(&state, &patient_id, PATIENT_NOT_FOUND).await?;
    let (Some(note_type), Some(content)) = (body.text("note_type"), body.text("content_text")) else {
        return Err(bad_request("note_type and content_text are required"));
    };

    let note = state
        .db()
        .insert_note(
            &patient_id,
            user.id(),
            note_type,
            body.text("title"),
            body.text("service_specialty"),
            content,
        )
        .await?;
    Ok(created(
        MessageResponse::new("Note created successfully").with("note_id", &note.id),
    ))
}

pub async fn list_notes(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<NoteSummary>>> {
    user.require("note:read")?;
    patient_or_404(&state, &patient_id, PATIENT_NOT_FOUND).await?;
    let notes = state.db().list_notes(&patient_id).await?;
    Ok(Json(notes.into_iter().map(NoteSummary::from).collect()))
}

pub async fn sign_note(
    State(state): State<ApiState>,
    Path(note_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    user.require("note:sign")?;
    let note = state
        .db()
        .find_note(&note_id)
        .await?
        .ok_or_else(|| ApiError::message(StatusCode::NOT_FOUND, "Note not found"))?;
    if note.status == "Final" {
        return Err(bad_request("Note is already signed"));
    }
    if note.author_user_id != user.id() {
        return Err(ApiError::message(
            StatusCode::FORBIDDEN,
            "Only the author can sign this note.",
        ));
    }

    state.db().sign_note(&note.id, user.id()).await?;
    info!("Note {} signed by user {}", note.id, user.id());
    Ok(Json(
        MessageResponse::new("Note signed successfully").with("note_id", &note.id),
    ))
}
