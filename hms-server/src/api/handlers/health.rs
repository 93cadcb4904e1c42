//! Liveness and dependency health

use super::super::ApiState;
use axum::{extract::State, response::Json};
use serde_json::{json, Value};

pub async fn health() -> &'static str {
    "HMS App is healthy!"
}

/// Backing store reachability; always 200 so probes can read the body
pub async fn health_details(State(state): State<ApiState>) -> Json<Value> {
    let health = state.db_manager.health_check().await;
    Json(json!({
        "status": if health.overall { "healthy" } else { "degraded" },
        "timestamp": chrono::Utc::now().timestamp(),
        "service": "hms-server",
        "postgres": health.postgres,
        "redis": health.redis,
    }))
}
