//! In-app notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: String,
    pub recipient_user_id: i32,
    pub message: String,
    pub notification_type: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub link_to_item_type: Option<String>,
    pub link_to_item_id: Option<String>,
    pub related_patient_id: Option<String>,
    pub related_patient_name: Option<String>,
    pub metadata_json: Option<Value>,
    pub is_urgent: bool,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_user_id: i32,
    pub message: String,
    pub notification_type: String,
    pub link_to_item_type: Option<String>,
    pub link_to_item_id: Option<String>,
    pub related_patient_id: Option<String>,
    pub metadata_json: Option<Value>,
    pub is_urgent: bool,
}

/// Filters for the notification inbox
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub is_read: Option<bool>,
    pub notification_type: Option<String>,
    pub is_urgent: Option<bool>,
}
