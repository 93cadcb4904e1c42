//! Read-only aggregate views: the personal dashboard, the patient timeline
//! and the operational reports.

use super::super::error::{ApiError, ApiResult};
use super::super::extract::CurrentUser;
use super::super::ApiState;
use crate::models::Patient;
use crate::services::reports::{self, ReportError, ReportQuery, ReportResult};
use crate::services::timeline::{build_timeline, TimelineEvent};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::error;

fn patient_summary(patient: &Patient) -> Value {
    json!({
        "id": patient.id,
        "mrn": patient.mrn,
        "full_name": patient.full_name(),
        "age": patient.age(),
        "gender": patient.gender,
    })
}

pub async fn dashboard(State(state): State<ApiState>, user: CurrentUser) -> ApiResult<Json<Value>> {
    user.require("dashboard:read")?;
    let db = state.db();
    let now = Utc::now();

    let patients = db.patients_attended_by(user.id()).await?;
    let open_tasks = db.open_tasks_for(user.id(), 10).await?;
    let unread_count = db.unread_notification_count(user.id()).await?;
    let unread = db.recent_unread_notifications(user.id(), 10).await?;
    let appointments = db.upcoming_appointments(user.id(), now, 5).await?;
    let labs = db
        .recent_lab_results_for_attending(user.id(), now - Duration::days(7), 5)
        .await?;
    let medications = db.active_inpatient_medications_for_attending(user.id(), 10).await?;

    Ok(Json(json!({
        "assigned_patients": patients.iter().map(patient_summary).collect::<Vec<_>>(),
        "open_tasks": open_tasks,
        "unread_notifications": {
            "count": unread_count,
            "items": unread,
        },
        "upcoming_appointments": appointments,
        "recent_lab_results": labs,
        "active_medications": medications,
    })))
}

pub async fn patient_timeline(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<TimelineEvent>>> {
    user.require("patient:read:timeline")?;
    let db = state.db();
    if !db.patient_exists(&patient_id).await? {
        return Err(ApiError::NotFound);
    }

    let notes = db.list_notes(&patient_id).await?;
    let orders = db.timeline_orders(&patient_id).await?;
    let labs = db.list_lab_results(&patient_id, None).await?;
    let administrations = db.all_administrations(&patient_id).await?;
    Ok(Json(build_timeline(&notes, &orders, &labs, &administrations)))
}

/// Map a report builder outcome onto the HTTP surface; failures are logged
/// and reported with the per-report message
fn report_response(outcome: ReportResult, failure: &'static str) -> ApiResult<Json<Value>> {
    match outcome {
        Ok(body) => Ok(Json(body)),
        Err(ReportError::BadRequest(text)) => Err(ApiError::error(StatusCode::BAD_REQUEST, text)),
        Err(ReportError::Failed(e)) => {
            error!("{}: {}", failure, e);
            Err(ApiError::error(StatusCode::INTERNAL_SERVER_ERROR, failure))
        }
    }
}

pub async fn patient_demographics_report(
    State(state): State<ApiState>,
    user: CurrentUser,
) -> ApiResult<Json<Value>> {
    user.require("report:read:patient_demographics")?;
    report_response(
        reports::patient_demographics(state.db()).await,
        "Could not generate patient demographics report.",
    )
}

pub async fn appointment_statistics_report(
    State(state): State<ApiState>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Value>> {
    user.require("report:read:appointment_stats")?;
    report_response(
        reports::appointment_statistics(state.db(), &query).await,
        "Could not generate appointment statistics report.",
    )
}

pub async fn lab_result_trends_report(
    State(state): State<ApiState>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Value>> {
    user.require("report:read:lab_result_trends")?;
    report_response(
        reports::lab_result_trends(state.db(), &query).await,
        "Could not generate lab result trends report.",
    )
}

pub async fn medication_usage_report(
    State(state): State<ApiState>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Value>> {
    user.require("report:read:medication_usage")?;
    report_response(
        reports::medication_usage(state.db(), &query).await,
        "Could not generate medication usage report.",
    )
}

pub async fn task_completion_report(
    State(state): State<ApiState>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Value>> {
    user.require("report:read:task_completion")?;
    report_response(
        reports::task_completion(state.db(), &query).await,
        "Could not generate task completion report.",
    )
}

pub async fn average_length_of_stay_report(
    State(state): State<ApiState>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Value>> {
    user.require("report:read:length_of_stay")?;
    report_response(
        reports::average_length_of_stay(state.db(), &query).await,
        "Could not generate average length of stay report.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_validation_errors_become_400() {
        let err = report_response(Err(ReportError::BadRequest("start_date and end_date required")), "boom")
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn report_bodies_pass_through() {
        let Json(body) = report_response(Ok(json!({"report_name": "x"})), "boom").unwrap();
        assert_eq!(body["report_name"], "x");
    }
}
