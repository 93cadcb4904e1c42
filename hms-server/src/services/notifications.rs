//! Notification creation, cooldown suppression and fan-out to delivery sinks

use crate::core::{HmsResult, NotificationSink};
use crate::database::PostgresManager;
use crate::models::{NewNotification, Notification};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

pub mod kind {
    pub const GENERAL: &str = "GENERAL";
    pub const ORDER_SIGNATURE_REQUESTED: &str = "ORDER_SIGNATURE_REQUESTED";
    pub const CRITICAL_LAB: &str = "CRITICAL_LAB";
    pub const NEW_ORDER_PHARMACY: &str = "NEW_ORDER_PHARMACY";
    pub const NEW_TASK_ASSIGNMENT: &str = "NEW_TASK_ASSIGNMENT";
    pub const TASK_ASSIGNMENT: &str = "TASK_ASSIGNMENT";
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("missing template key '{0}'")]
    MissingKey(String),
    #[error("unbalanced brace in template")]
    Unbalanced,
}

/// Fill `{name}` placeholders from `context`. `{{` and `}}` are literal braces.
pub fn render_template(template: &str, context: &HashMap<&str, String>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => key.push(ch),
                        None => return Err(TemplateError::Unbalanced),
                    }
                }
                match context.get(key.as_str()) {
                    Some(value) => out.push_str(value),
                    None => return Err(TemplateError::MissingKey(key)),
                }
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(TemplateError::Unbalanced),
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Everything needed to notify one or more users about the same event
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub recipients: Vec<i32>,
    pub template: String,
    pub context: HashMap<&'static str, String>,
    pub notification_type: String,
    pub link_to_item_type: Option<String>,
    pub link_to_item_id: Option<String>,
    pub related_patient_id: Option<String>,
    pub is_urgent: bool,
    pub metadata_json: Option<Value>,
    /// `None` uses the configured default
    pub cooldown_minutes: Option<i64>,
}

impl NotificationRequest {
    pub fn new(recipients: Vec<i32>, template: impl Into<String>) -> Self {
        Self {
            recipients,
            template: template.into(),
            context: HashMap::new(),
            notification_type: kind::GENERAL.to_string(),
            link_to_item_type: None,
            link_to_item_id: None,
            related_patient_id: None,
            is_urgent: false,
            metadata_json: None,
            cooldown_minutes: None,
        }
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.insert(key, value.into());
        self
    }

    pub fn kind(mut self, notification_type: &str) -> Self {
        self.notification_type = notification_type.to_string();
        self
    }

    pub fn link(mut self, item_type: &str, item_id: impl Into<String>) -> Self {
        self.link_to_item_type = Some(item_type.to_string());
        self.link_to_item_id = Some(item_id.into());
        self
    }

    pub fn patient(mut self, patient_id: Option<String>) -> Self {
        self.related_patient_id = patient_id;
        self
    }

    pub fn urgent(mut self, is_urgent: bool) -> Self {
        self.is_urgent = is_urgent;
        self
    }

    pub fn cooldown(mut self, minutes: i64) -> Self {
        self.cooldown_minutes = Some(minutes);
        self
    }
}

/// The JSON pushed to live connections and published on Redis
pub fn delivery_payload(notification: &Notification) -> Value {
    let mut payload = json!({ "type": "new_notification" });
    if let (Value::Object(map), Ok(Value::Object(fields))) = (&mut payload, serde_json::to_value(notification)) {
        map.extend(fields);
    }
    payload
}

pub struct NotificationService {
    db: Arc<PostgresManager>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    default_cooldown_minutes: i64,
}

impl NotificationService {
    pub fn new(db: Arc<PostgresManager>, default_cooldown_minutes: i64) -> Self {
        Self {
            db,
            sinks: Vec::new(),
            default_cooldown_minutes,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Persist one notification per eligible recipient and push each to every sink.
    ///
    /// Unknown users, unrenderable templates and duplicates inside the cooldown
    /// window are skipped, so the result may be shorter than the recipient list.
    pub async fn create(&self, request: NotificationRequest) -> HmsResult<Vec<Notification>> {
        let cooldown = request.cooldown_minutes.unwrap_or(self.default_cooldown_minutes);
        let mut batch = Vec::new();

        for &user_id in &request.recipients {
            if !self.db.user_exists(user_id).await? {
                warn!("Skipping notification for non-existent user_id: {}", user_id);
                continue;
            }

            let message = match render_template(&request.template, &request.context) {
                Ok(message) => message,
                Err(e) => {
                    error!(
                        "Template formatting error for user {}: {} (template: '{}')",
                        user_id, e, request.template
                    );
                    continue;
                }
            };

            let candidate = NewNotification {
                recipient_user_id: user_id,
                message,
                notification_type: request.notification_type.clone(),
                link_to_item_type: request.link_to_item_type.clone(),
                link_to_item_id: request.link_to_item_id.clone(),
                related_patient_id: request.related_patient_id.clone(),
                metadata_json: request.metadata_json.clone(),
                is_urgent: request.is_urgent,
            };

            if cooldown > 0 {
                let since = Utc::now() - Duration::minutes(cooldown);
                if self.db.recent_duplicate_exists(&candidate, since).await? {
                    info!(
                        "Cooldown: skipped duplicate for user {}, type '{}', item '{:?}:{:?}'",
                        user_id, candidate.notification_type, candidate.link_to_item_type, candidate.link_to_item_id
                    );
                    continue;
                }
            }

            batch.push(candidate);
        }

        if batch.is_empty() {
            debug!("No new notifications prepared (all recipients invalid or within cooldown)");
            return Ok(Vec::new());
        }

        let stored = self.db.insert_notifications(&batch).await?;
        for notification in &stored {
            info!(
                id = %notification.id,
                recipient = notification.recipient_user_id,
                kind = %notification.notification_type,
                urgent = notification.is_urgent,
                "Notification created"
            );
            self.fan_out(notification).await;
        }

        Ok(stored)
    }

    async fn fan_out(&self, notification: &Notification) {
        let payload = delivery_payload(notification);
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(notification.recipient_user_id, &payload).await {
                warn!("Notification sink {} failed: {}", sink.name(), e);
            }
        }
    }

    /// Fire-and-log wrapper used by request handlers: a failed notification
    /// never fails the request that triggered it.
    pub async fn send(&self, request: NotificationRequest) {
        let kind = request.notification_type.clone();
        if let Err(e) = self.create(request).await {
            error!("Failed to create {} notification: {}", kind, e);
        }
    }

    pub async fn notify_order_signature_required(
        &self,
        order_id: &str,
        signer_user_id: i32,
        patient_id: &str,
        order_description: &str,
    ) {
        let request = NotificationRequest::new(
            vec![signer_user_id],
            "Order '{order_desc}' for patient requires your signature.",
        )
        .with("order_desc", order_description)
        .kind(kind::ORDER_SIGNATURE_REQUESTED)
        .link("Order", order_id)
        .patient(Some(patient_id.to_string()))
        .urgent(true)
        .cooldown(0);
        self.send(request).await;
    }

    pub async fn notify_critical_lab_result(
        &self,
        lab_result_id: &str,
        patient_id: &str,
        lab_display: &str,
        care_team: Vec<i32>,
    ) {
        let request = NotificationRequest::new(care_team, "Critical lab alert: {lab_info}")
            .with("lab_info", lab_display)
            .kind(kind::CRITICAL_LAB)
            .link("LabResult", lab_result_id)
            .patient(Some(patient_id.to_string()))
            .urgent(true)
            .cooldown(10);
        self.send(request).await;
    }

    /// Page every member of the Pharmacy group about a new medication order
    pub async fn notify_pharmacy_new_order(
        &self,
        order_id: &str,
        patient_id: &str,
        patient_name: &str,
        medication_name: &str,
        pharmacy_user_ids: Vec<i32>,
    ) {
        if pharmacy_user_ids.is_empty() {
            error!("No pharmacy recipients found for order {}", order_id);
            return;
        }
        let request = NotificationRequest::new(
            pharmacy_user_ids,
            "New medication order for {patient_name}: {medication_name}",
        )
        .with("patient_name", patient_name)
        .with("medication_name", medication_name)
        .kind(kind::NEW_ORDER_PHARMACY)
        .link("Order", order_id)
        .patient(Some(patient_id.to_string()))
        .urgent(true)
        .cooldown(3);
        self.send(request).await;
    }

    pub async fn notify_new_task(
        &self,
        task_id: &str,
        assignee: i32,
        creator_name: &str,
        task_title: &str,
        patient_id: Option<String>,
        is_urgent: bool,
    ) {
        let request = NotificationRequest::new(
            vec![assignee],
            "You have been assigned a new task by {creator_name}: '{task_title}'",
        )
        .with("creator_name", creator_name)
        .with("task_title", task_title)
        .kind(kind::NEW_TASK_ASSIGNMENT)
        .link("Task", task_id)
        .patient(patient_id)
        .urgent(is_urgent);
        self.send(request).await;
    }

    pub async fn notify_task_reassigned(
        &self,
        task_id: &str,
        assignee: i32,
        modifier_name: &str,
        task_title: &str,
        patient_id: Option<String>,
        is_urgent: bool,
    ) {
        let request = NotificationRequest::new(
            vec![assignee],
            "Task '{task_title}' has been re-assigned to you by {modifier_name}.",
        )
        .with("task_title", task_title)
        .with("modifier_name", modifier_name)
        .kind(kind::TASK_ASSIGNMENT)
        .link("Task", task_id)
        .patient(patient_id)
        .urgent(is_urgent);
        self.send(request).await;
    }
}

/// In-process per-user broadcast channels feeding live WebSocket connections
pub struct NotificationHub {
    channels: RwLock<HashMap<i32, broadcast::Sender<Value>>>,
    capacity: usize,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn subscribe(&self, user_id: i32) -> broadcast::Receiver<Value> {
        let mut channels = self.channels.write().await;
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of live connections for a user
    pub async fn connections(&self, user_id: i32) -> usize {
        let channels = self.channels.read().await;
        channels.get(&user_id).map(|tx| tx.receiver_count()).unwrap_or(0)
    }

    /// Drop channels whose last connection has gone away
    pub async fn prune(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

#[async_trait]
impl NotificationSink for NotificationHub {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn deliver(&self, recipient_user_id: i32, payload: &Value) -> HmsResult<()> {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(&recipient_user_id) {
            // No receivers just means the user is offline
            let _ = tx.send(payload.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn renders_placeholders() {
        let message = render_template(
            "New medication order for {patient_name}: {medication_name}",
            &ctx(&[("patient_name", "Jane Doe"), ("medication_name", "Aspirin")]),
        )
        .unwrap();
        assert_eq!(message, "New medication order for Jane Doe: Aspirin");
    }

    #[test]
    fn missing_key_is_reported() {
        let err = render_template("Critical lab alert: {lab_info}", &HashMap::new()).unwrap_err();
        assert_eq!(err, TemplateError::MissingKey("lab_info".to_string()));
    }

    #[test]
    fn doubled_braces_are_literal() {
        let message = render_template("{{raw}} {x}", &ctx(&[("x", "1")])).unwrap();
        assert_eq!(message, "{raw} 1");
        assert_eq!(render_template("oops {x", &ctx(&[("x", "1")])), Err(TemplateError::Unbalanced));
        assert_eq!(render_template("oops }", &HashMap::new()), Err(TemplateError::Unbalanced));
    }

    #[test]
    fn request_builder_defaults() {
        let request = NotificationRequest::new(vec![1, 2], "hello");
        assert_eq!(request.notification_type, kind::GENERAL);
        assert_eq!(request.cooldown_minutes, None);
        assert!(!request.is_urgent);

        let request = request.kind(kind::CRITICAL_LAB).link("LabResult", "abc").urgent(true).cooldown(10);
        assert_eq!(request.link_to_item_type.as_deref(), Some("LabResult"));
        assert_eq!(request.link_to_item_id.as_deref(), Some("abc"));
        assert_eq!(request.cooldown_minutes, Some(10));
    }

    #[test]
    fn payload_is_tagged() {
        let notification = Notification {
            id: "n1".into(),
            recipient_user_id: 3,
            message: "hi".into(),
            notification_type: kind::GENERAL.into(),
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
            link_to_item_type: None,
            link_to_item_id: None,
            related_patient_id: None,
            related_patient_name: None,
            metadata_json: None,
            is_urgent: false,
        };
        let payload = delivery_payload(&notification);
        assert_eq!(payload["type"], "new_notification");
        assert_eq!(payload["id"], "n1");
        assert_eq!(payload["recipient_user_id"], 3);
    }

    #[tokio::test]
    async fn hub_delivers_only_to_recipient() {
        let hub = NotificationHub::new(8);
        let mut alice = hub.subscribe(1).await;
        let mut bob = hub.subscribe(2).await;

        hub.deliver(1, &json!({"type": "new_notification", "id": "x"})).await.unwrap();

        assert_eq!(alice.recv().await.unwrap()["id"], "x");
        assert!(bob.try_recv().is_err());
    }

    #[tokio::test]
    async fn hub_prunes_closed_channels() {
        let hub = NotificationHub::new(4);
        let rx = hub.subscribe(9).await;
        assert_eq!(hub.connections(9).await, 1);
        drop(rx);
        hub.prune().await;
        assert_eq!(hub.connections(9).await, 0);
        // Delivering to an offline user is not an error
        hub.deliver(9, &json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn joined_aborted_listener_releases_its_channel() {
        let hub = NotificationHub::new(4);
        let mut rx = hub.subscribe(5).await;
        let listener = tokio::spawn(async move {
            let _ = rx.recv().await;
        });
        tokio::task::yield_now().await;

        listener.abort();
        let _ = listener.await;
        hub.prune().await;
        assert_eq!(hub.connections(5).await, 0);
    }
}
