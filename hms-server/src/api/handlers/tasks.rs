//! Task assignment and tracking

use super::super::error::{ApiError, ApiResult};
use super::super::extract::{CurrentUser, JsonBody};
use super::super::responses::{created, message, paged, MessageResponse};
use super::super::ApiState;
use super::{datetime_field, nullable_text};
use crate::core::types::end_of_day;
use crate::core::PaginationQuery;
use crate::models::task::{STATUS_PENDING, TASK_STATUSES};
use crate::models::{NewTask, Task};
use crate::repositories::TaskFilter;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub assigned_to_user_id: Option<String>,
    pub patient_id: Option<String>,
    pub completed: Option<String>,
    pub priority: Option<String>,
    pub department: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationQuery,
}

fn bad_request(text: impl Into<String>) -> ApiError {
    ApiError::message(StatusCode::BAD_REQUEST, text)
}

fn forbidden(text: &str) -> ApiError {
    ApiError::message(StatusCode::FORBIDDEN, text)
}

fn not_found(text: &str) -> ApiError {
    ApiError::message(StatusCode::NOT_FOUND, text)
}

async fn task_or_404(state: &ApiState, task_id: &str) -> ApiResult<Task> {
    state.db().find_task(task_id).await?.ok_or(ApiError::NotFound)
}

/// Assignee, creator or a holder of `task:update:any`
fn ensure_may_update(user: &CurrentUser, task: &Task, denied: &str) -> ApiResult<()> {
    if task.is_participant(user.id()) || user.has("task:update:any") {
        Ok(())
    } else {
        Err(forbidden(denied))
    }
}

/// Resolve list filters against the caller's visibility.
///
/// Without `task:read:any` a caller only ever sees tasks assigned to them.
fn resolve_filter(user: &CurrentUser, params: &TaskListQuery) -> ApiResult<TaskFilter> {
    let can_read_any = user.has("task:read:any");
    let mut filter = TaskFilter {
        completed: params.completed.as_deref().map(|c| c.eq_ignore_ascii_case("true")),
        priority: params.priority.clone().filter(|p| !p.is_empty()),
        department: params.department.clone().filter(|d| !d.is_empty()),
        ..Default::default()
    };

    match (
        params.assigned_to_user_id.as_deref().filter(|a| !a.is_empty()),
        params.patient_id.as_deref().filter(|p| !p.is_empty()),
    ) {
        (Some(assignee), _) if assignee.eq_ignore_ascii_case("me") => {
            filter.assigned_to_user_id = Some(user.id());
        }
        (Some(assignee), _) => {
            if !can_read_any {
                return Err(forbidden(
                    "Permission 'task:read:any' required to view tasks for other users.",
                ));
            }
            let id = assignee
                .trim()
                .parse()
                .map_err(|_| bad_request("Invalid assigned_to_user_id filter format."))?;
            filter.assigned_to_user_id = Some(id);
        }
        (None, Some(patient_id)) => {
            filter.patient_id = Some(patient_id.to_string());
            if !can_read_any {
                filter.assigned_to_user_id = Some(user.id());
            }
        }
        (None, None) if !can_read_any => filter.assigned_to_user_id = Some(user.id()),
        (None, None) => {}
    }
    Ok(filter)
}

pub async fn create_task(
    State(state): State<ApiState>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    user.require("task:create")?;
    if !body.missing(&["title", "assigned_to_user_id"]).is_empty() {
        return Err(bad_request("title and assigned_to_user_id are required."));
    }

    let assignee = match body.int("assigned_to_user_id").and_then(|id| i32::try_from(id).ok()) {
        Some(id) => state.db().find_user_by_id(id).await?,
        None => None,
    }
    .ok_or_else(|| not_found("Assigned user not found."))?;

    let patient_id = body.text_lossy("patient_id");
    if let Some(pid) = patient_id.as_deref() {
        if !state.db().patient_exists(pid).await? {
            return Err(not_found("Patient not found."));
        }
    }
    let due = datetime_field(&body, "due_datetime", || {
        bad_request("Invalid due_datetime format. Use ISO format.")
    })?;

    let task = state
        .db()
        .insert_task(&NewTask {
            title: body.text_lossy("title").unwrap_or_default(),
            description: body.text("description").map(String::from),
            due_datetime: due,
            patient_id,
            assigned_to_user_id: assignee.id,
            created_by_user_id: user.id(),
            priority: body.text("priority").unwrap_or("Normal").to_string(),
            category: body.text("category").map(String::from),
            department: body.text("department").map(String::from),
            status: body.text("status").unwrap_or(STATUS_PENDING).to_string(),
            is_urgent: body.flag("is_urgent").unwrap_or(false),
            visibility: body.text("visibility").unwrap_or("private").to_string(),
        })
        .await?;
    info!("Task {} created by user {} for user {}", task.id, user.id(), assignee.id);

    if assignee.id != user.id() {
        state
            .notifications
            .notify_new_task(
                &task.id,
                assignee.id,
                &user.display_name(),
                &task.title,
                task.patient_id.clone(),
                task.is_urgent,
            )
            .await;
    }

    Ok(created(
        MessageResponse::new("Task created successfully").with("task", &task),
    ))
}

pub async fn list_tasks(
    State(state): State<ApiState>,
    user: CurrentUser,
    Query(params): Query<TaskListQuery>,
) -> ApiResult<Json<Value>> {
    user.require("task:read:own")?;
    let filter = resolve_filter(&user, &params)?;
    let page = state
        .db()
        .list_tasks(&filter, params.pagination.resolve(20))
        .await?;
    paged("tasks", page)
}

pub async fn get_task(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<Task>> {
    user.require("task:read:own")?;
    let task = task_or_404(&state, &task_id).await?;
    if !(task.is_participant(user.id()) || user.has("task:read:any") || task.visibility == "public") {
        return Err(forbidden("Unauthorized to view this specific task."));
    }
    Ok(Json(task))
}

pub async fn update_task(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<Json<MessageResponse>> {
    user.require("task:update:own")?;
    let mut task = task_or_404(&state, &task_id).await?;
    ensure_may_update(&user, &task, "Unauthorized to update this task.")?;
    if body.is_empty() {
        return Err(bad_request("No update data provided"));
    }

    let previous_assignee = task.assigned_to_user_id;
    if let Some(title) = body.text_lossy("title") {
        task.title = title;
    }
    for (key, slot) in [
        ("description", &mut task.description),
        ("category", &mut task.category),
        ("department", &mut task.department),
    ] {
        if let Some(value) = nullable_text(&body, key) {
            *slot = value;
        }
    }
    for (key, slot) in [
        ("priority", &mut task.priority),
        ("status", &mut task.status),
        ("visibility", &mut task.visibility),
    ] {
        if let Some(value) = body.text(key) {
            *slot = value.to_string();
        }
    }
    if let Some(urgent) = body.flag("is_urgent") {
        task.is_urgent = urgent;
    }

    let mut new_assignee = None;
    if body.has("assigned_to_user_id") {
        task.assigned_to_user_id = match body.get("assigned_to_user_id") {
            None => None,
            Some(_) => {
                let assignee = match body.int("assigned_to_user_id").and_then(|id| i32::try_from(id).ok()) {
                    Some(id) => state.db().find_user_by_id(id).await?,
                    None => None,
                }
                .ok_or_else(|| not_found("New assigned user not found."))?;
                new_assignee = Some(assignee.id);
                Some(assignee.id)
            }
        };
    }
    if body.has("due_datetime") {
        task.due_datetime = datetime_field(&body, "due_datetime", || bad_request("Invalid due_datetime format."))?;
    }

    let now = Utc::now();
    if let Some(completed) = body.flag("completed") {
        task.apply_completed(completed, now);
    }
    let status = task.status.clone();
    task.apply_status(&status, now);
    task.updated_at = now;

    let task = state.db().save_task(&task).await?;
    info!("Task {} updated by user {}", task.id, user.id());

    if let Some(assignee) = new_assignee.filter(|a| Some(*a) != previous_assignee && *a != user.id()) {
        state
            .notifications
            .notify_task_reassigned(
                &task.id,
                assignee,
                &user.display_name(),
                &task.title,
                task.patient_id.clone(),
                task.is_urgent,
            )
            .await;
    }

    Ok(Json(
        MessageResponse::new("Task updated successfully").with("task", &task),
    ))
}

pub async fn delete_task(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    user.require("task:delete:own")?;
    let task = task_or_404(&state, &task_id).await?;
    if task.created_by_user_id != user.id() && !user.has("task:delete:any") {
        return Err(forbidden("Unauthorized to delete this task."));
    }
    state.db().delete_task(&task.id).await?;
    info!("Task {} deleted by user {}", task.id, user.id());
    Ok(message("Task deleted successfully"))
}

pub async fn complete_task(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<Task>> {
    user.require("task:update:own")?;
    let mut task = task_or_404(&state, &task_id).await?;
    ensure_may_update(&user, &task, "Unauthorized to complete this task.")?;
    if task.completed {
        return Err(bad_request("Task already completed."));
    }

    let now = Utc::now();
    task.apply_completed(true, now);
    task.updated_at = now;
    Ok(Json(state.db().save_task(&task).await?))
}

pub async fn update_task_status(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<Json<MessageResponse>> {
    user.require("task:update:own")?;
    let mut task = task_or_404(&state, &task_id).await?;
    ensure_may_update(&user, &task, "Unauthorized to update status of this task.")?;

    let Some(status) = body.text("status").filter(|s| TASK_STATUSES.contains(s)) else {
        return Err(bad_request(format!(
            "Invalid status. Must be one of: {}",
            TASK_STATUSES.join(", ")
        )));
    };
    let now = Utc::now();
    task.apply_status(status, now);
    task.updated_at = now;
    let task = state.db().save_task(&task).await?;

    Ok(Json(
        MessageResponse::new(format!("Task status updated to {}", status)).with("task", &task),
    ))
}

pub async fn task_summary(State(state): State<ApiState>, user: CurrentUser) -> ApiResult<Json<Value>> {
    user.require("task:read:any")?;
    let (total, summary) = state.db().task_status_summary().await?;
    Ok(Json(json!({
        "total_tasks": total,
        "status_summary": summary,
    })))
}

/// Open tasks assigned to the caller that fall due today (UTC)
pub async fn today_tasks(State(state): State<ApiState>, user: CurrentUser) -> ApiResult<Json<Vec<Task>>> {
    user.require("task:read:own")?;
    let today = Utc::now().date_naive();
    let start = Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN));
    let tasks = state.db().tasks_due_between(user.id(), start, end_of_day(today)).await?;
    Ok(Json(tasks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    fn caller(id: i32, permissions: &[&str]) -> CurrentUser {
        let now = Utc::now();
        CurrentUser {
            user: User {
                id,
                username: format!("user{}", id),
                email: format!("user{}@example.org", id),
                hashed_password: String::new(),
                full_name: None,
                is_active: true,
                mfa_enabled: false,
                password_reset_token: None,
                password_reset_expires: None,
                created_at: now,
                updated_at: now,
            },
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            jti: None,
            exp: 0,
        }
    }

    fn query(assigned: Option<&str>, patient: Option<&str>) -> TaskListQuery {
        TaskListQuery {
            assigned_to_user_id: assigned.map(String::from),
            patient_id: patient.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn own_scope_is_forced_without_read_any() {
        let nurse = caller(7, &["task:read:own"]);
        let filter = resolve_filter(&nurse, &query(None, None)).unwrap();
        assert_eq!(filter.assigned_to_user_id, Some(7));

        let filter = resolve_filter(&nurse, &query(None, Some("p1"))).unwrap();
        assert_eq!(filter.assigned_to_user_id, Some(7));
        assert_eq!(filter.patient_id.as_deref(), Some("p1"));

        assert_eq!(resolve_filter(&nurse, &query(Some("9"), None)).unwrap_err().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn supervisors_may_filter_by_any_assignee() {
        let lead = caller(1, &["task:read:own", "task:read:any"]);
        assert_eq!(resolve_filter(&lead, &query(Some("9"), None)).unwrap().assigned_to_user_id, Some(9));
        assert_eq!(resolve_filter(&lead, &query(Some("me"), None)).unwrap().assigned_to_user_id, Some(1));
        assert!(resolve_filter(&lead, &query(None, None)).unwrap().assigned_to_user_id.is_none());
        assert_eq!(
            resolve_filter(&lead, &query(Some("nine"), None)).unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
