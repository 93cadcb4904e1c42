use super::super::error::{ApiError, ApiResult};
use super::super::extract::CurrentUser;
use super::super::responses::{message, paged, MessageResponse};
use super::super::ApiState;
use crate::core::PaginationQuery;
use crate::models::{Notification, NotificationFilter};
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
pub struct NotificationQuery {
    pub is_read: Option<String>,
    #[serde(rename = "type")]
    pub notification_type: Option<String>,
    pub is_urgent: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationQuery,
}

impl NotificationQuery {
    fn filter(&self) -> NotificationFilter {
        let truthy = |raw: &Option<String>| raw.as_deref().map(|v| v.eq_ignore_ascii_case("true"));
        NotificationFilter {
            is_read: truthy(&self.is_read),
            notification_type: self.notification_type.clone().filter(|t| !t.is_empty()),
            is_urgent: truthy(&self.is_urgent),
        }
    }
}

async fn own_notification(
    state: &ApiState,
    user: &CurrentUser,
    notification_id: &str,
    denied: &str,
) -> ApiResult<Notification> {
    state
        .db()
        .find_notification_for(notification_id, user.id())
        .await?
        .ok_or_else(|| ApiError::message(StatusCode::NOT_FOUND, denied))
}

/// The caller's inbox, newest first, with the overall unread count
pub async fn list_notifications(
    State(state): State<ApiState>,
    user: CurrentUser,
    Query(params): Query<NotificationQuery>,
) -> ApiResult<Json<Value>> {
    user.require("notification:read")?;
    let (page, unread) = state
        .db()
        .list_notifications(user.id(), &params.filter(), params.pagination.resolve(20))
        .await?;

    let Json(mut body) = paged("notifications", page)?;
    if let Value::Object(map) = &mut body {
        map.insert("unread_count".to_string(), json!(unread));
    }
    Ok(Json(body))
}

pub async fn mark_notification_read(
    State(state): State<ApiState>,
    Path(notification_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    user.require("notification:update")?;
    let notification = own_notification(
        &state,
        &user,
        &notification_id,
        "Notification not found or you do not have access to modify it.",
    )
    .await?;
    if notification.is_read {
        return Ok(Json(
            MessageResponse::new("Notification already marked as read.").with("notification", &notification),
        ));
    }

    let notification = state.db().mark_notification_read(&notification.id, Utc::now()).await?;
    Ok(Json(
        MessageResponse::new("Notification marked as read.").with("notification", &notification),
    ))
}

pub async fn mark_all_notifications_read(
    State(state): State<ApiState>,
    user: CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    user.require("notification:update")?;
    let count = state.db().mark_all_notifications_read(user.id(), Utc::now()).await?;
    if count == 0 {
        return Ok(message("No unread notifications to mark as read."));
    }
    info!("User {} marked {} notification(s) as read", user.id(), count);
    Ok(message(format!("{} notification(s) marked as read.", count)))
}

pub async fn delete_notification(
    State(state): State<ApiState>,
    Path(notification_id): Path<String>,
    user: CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    user.require("notification:delete")?;
    let notification = own_notification(
        &state,
        &user,
        &notification_id,
        "Notification not found or you do not have access to delete it.",
    )
    .await?;
    state.db().delete_notification(&notification.id).await?;
    info!("Notification {} deleted by user {}", notification.id, user.id());
    Ok(message("Notification deleted successfully."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_filters_only_apply_when_given() {
        assert!(NotificationQuery::default().filter().is_read.is_none());
        let query = NotificationQuery {
            is_read: Some("TRUE".into()),
            is_urgent: Some("no".into()),
            notification_type: Some(String::new()),
            ..Default::default()
        };
        let filter = query.filter();
        assert_eq!(filter.is_read, Some(true));
        assert_eq!(filter.is_urgent, Some(false));
        assert!(filter.notification_type.is_none());
    }
}
