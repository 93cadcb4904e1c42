//! Audit trail entries

use serde_json::Value;

pub mod action {
    pub const LOGIN_SUCCESS: &str = "LOGIN_SUCCESS";
    pub const LOGIN_FAILURE: &str = "LOGIN_FAILURE";
    pub const PATIENT_CREATE: &str = "PATIENT_CREATE";
    pub const PATIENT_UPDATE: &str = "PATIENT_UPDATE";
    pub const ORDER_STATUS_CHANGE: &str = "ORDER_STATUS_CHANGE";
}

pub const SYSTEM_ACTOR: &str = "system";

/// A pending audit row before it is written
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub user_id: Option<i32>,
    pub user_username: String,
    pub action: &'static str,
    pub target_model: Option<String>,
    pub target_id: Option<String>,
    pub change_details: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
