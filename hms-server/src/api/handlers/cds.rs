//! Clinical decision support endpoints

use super::super::error::{ApiError, ApiResult};
use super::super::extract::{CurrentUser, JsonBody};
use super::super::responses::{created, MessageResponse};
use super::super::ApiState;
use crate::models::CdsRule;
use crate::services::cds;
use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Map, Value};
use tracing::info;

/// Dry-run the order checks without placing anything
pub async fn execute_checks(
    State(state): State<ApiState>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<Json<Value>> {
    user.require("cds:execute")?;
    let (Some(patient_id), Some(item_id)) = (body.text_lossy("patient_id"), body.text_lossy("orderable_item_id"))
    else {
        return Err(ApiError::bad_request("patient_id and orderable_item_id are required."));
    };

    if !state.db().patient_exists(&patient_id).await? {
        return Err(ApiError::NotFound);
    }
    let item = state
        .db()
        .find_orderable_item(&item_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let order_details = body
        .get("order_details")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    let alerts = cds::run_checks(state.db(), &patient_id, &item, &order_details).await?;
    Ok(Json(json!({ "cds_alerts": alerts })))
}

pub async fn list_rules(State(state): State<ApiState>, user: CurrentUser) -> ApiResult<Json<Vec<CdsRule>>> {
    user.require("cds:manage_rules")?;
    Ok(Json(state.db().list_cds_rules().await?))
}

pub async fn create_rule(
    State(state): State<ApiState>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    user.require("cds:manage_rules")?;
    let (Some(rule_name), Some(rule_type), Some(rule_logic)) =
        (body.text("rule_name"), body.text("rule_type"), body.get("rule_logic"))
    else {
        return Err(ApiError::bad_request("rule_name, rule_type and rule_logic are required."));
    };
    if !rule_logic.is_object() {
        return Err(ApiError::bad_request("rule_logic must be a JSON object."));
    }

    let rule = match state
        .db()
        .insert_cds_rule(
            rule_name,
            body.text("description"),
            rule_type,
            rule_logic,
            body.flag("is_active").unwrap_or(true),
        )
        .await
    {
        Ok(rule) => rule,
        Err(e) if e.is_unique_violation() => {
            return Err(ApiError::error(
                StatusCode::CONFLICT,
                format!("A CDS rule named '{}' already exists.", rule_name),
            ))
        }
        Err(e) => return Err(e.into()),
    };
    info!("CDS rule {} ({}) created by user {}", rule.rule_name, rule.rule_type, user.id());

    Ok(created(
        MessageResponse::new("CDS rule created successfully").with("rule", &rule),
    ))
}
