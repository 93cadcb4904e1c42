//! Audit trail recording

use crate::database::PostgresManager;
use crate::models::audit::SYSTEM_ACTOR;
use crate::models::{AuditEvent, Patient, User};
use axum::http::HeaderMap;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use tracing::{debug, error};

/// Where a request came from, as recorded on every audit row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// First `X-Forwarded-For` hop, falling back to the socket peer
    pub fn from_parts(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);
        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        Self {
            ip_address: forwarded.or_else(|| peer.map(|addr| addr.ip().to_string())),
            user_agent,
        }
    }
}

impl AuditEvent {
    pub fn new(action: &'static str, actor: Option<&User>, client: &ClientInfo) -> Self {
        Self {
            user_id: actor.map(|u| u.id),
            user_username: actor
                .map(|u| u.username.clone())
                .unwrap_or_else(|| SYSTEM_ACTOR.to_string()),
            action,
            target_model: None,
            target_id: None,
            change_details: None,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        }
    }

    pub fn target(mut self, model: &str, id: impl ToString) -> Self {
        self.target_model = Some(model.to_string());
        self.target_id = Some(id.to_string());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.change_details = Some(details);
        self
    }
}

/// Write one audit row. Failures are logged and never surface to the caller.
pub async fn record(db: &PostgresManager, event: AuditEvent) {
    match db.insert_audit_event(&event).await {
        Ok(id) => debug!("Audit {} recorded as #{}", event.action, id),
        Err(e) => error!("Failed to record audit event {}: {}", event.action, e),
    }
}

/// Per-field `{"old", "new"}` diff between two patient snapshots
pub fn patient_changes(before: &Patient, after: &Patient) -> Option<Value> {
    let changes: Map<String, Value> = before
        .audit_fields()
        .into_iter()
        .zip(after.audit_fields())
        .filter(|((_, old), (_, new))| old != new)
        .map(|((field, old), (_, new))| (field.to_string(), json!({ "old": old, "new": new })))
        .collect();
    if changes.is_empty() {
        None
    } else {
        Some(Value::Object(changes))
    }
}

pub fn status_change(old: &str, new: &str) -> Value {
    json!({ "status": { "old": old, "new": new } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::{NaiveDate, Utc};

    fn patient() -> Patient {
        Patient {
            id: "p1".into(),
            mrn: "MRN001".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
            gender: Some("Female".into()),
            attending_physician_id: None,
            code_status: "Full Code".into(),
            isolation_precautions: None,
            admission_date: None,
            discharge_date: None,
            known_cad: false,
            congestive_heart_failure: false,
            hypertension: false,
            diabetes: false,
            stroke_or_tia: false,
            vascular_disease: false,
            atrial_fibrillation: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8.0"));
        let peer: SocketAddr = "127.0.0.1:5555".parse().unwrap();

        let info = ClientInfo::from_parts(&headers, Some(peer));
        assert_eq!(info.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(info.user_agent.as_deref(), Some("curl/8.0"));

        let direct = ClientInfo::from_parts(&HeaderMap::new(), Some(peer));
        assert_eq!(direct.ip_address.as_deref(), Some("127.0.0.1"));
        assert!(direct.user_agent.is_none());
    }

    #[test]
    fn anonymous_events_use_system_actor() {
        let event = AuditEvent::new("LOGIN_FAILURE", None, &ClientInfo::default())
            .details(json!({ "username_attempt": "ghost" }));
        assert_eq!(event.user_username, "system");
        assert!(event.user_id.is_none());
        assert!(event.target_model.is_none());
    }

    #[test]
    fn diff_lists_only_changed_fields() {
        let before = patient();
        let mut after = before.clone();
        assert!(patient_changes(&before, &after).is_none());

        after.code_status = "DNR".into();
        after.hypertension = true;
        after.updated_at = Utc::now();
        let diff = patient_changes(&before, &after).unwrap();
        assert_eq!(diff["code_status"], json!({ "old": "Full Code", "new": "DNR" }));
        assert_eq!(diff["hypertension"]["new"], true);
        assert_eq!(diff.as_object().unwrap().len(), 2);
    }
}
