//! Computerized provider order entry

use super::super::error::{ApiError, ApiResult};
use super::super::extract::{Client, CurrentUser, JsonBody};
use super::super::responses::{created, paged, to_json, MessageResponse};
use super::super::ApiState;
use crate::core::PaginationQuery;
use crate::database::redis::catalog_cache_key;
use crate::models::audit::action;
use crate::models::order::status;
use crate::models::user::PHARMACY_GROUP;
use crate::models::{AuditEvent, CatalogItem, NewOrder, Order};
use crate::services::{audit, cds};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationQuery,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationQuery,
}

/// Active catalog items, served from Redis when a page is cached
pub async fn list_orderable_items(
    State(state): State<ApiState>,
    user: CurrentUser,
    Query(params): Query<CatalogQuery>,
) -> ApiResult<Json<Value>> {
    user.require("order:read_catalog")?;
    let pagination = params.pagination.resolve(50);
    let name = params.query.as_deref().filter(|q| !q.is_empty());
    let item_type = params.item_type.as_deref().filter(|t| !t.is_empty());

    let cache_key = catalog_cache_key(
        name.unwrap_or(""),
        item_type.unwrap_or(""),
        pagination.page,
        pagination.per_page,
    );
    match state.cache().get_json::<Value>(&cache_key).await {
        Ok(Some(cached)) => {
            debug!("Catalog cache hit for {}", cache_key);
            return Ok(Json(cached));
        }
        Ok(None) => {}
        Err(e) => warn!("Catalog cache read failed: {}", e),
    }

    let page = state
        .db()
        .search_orderable_items(name, item_type, pagination)
        .await?
        .map(CatalogItem::from);
    let Json(body) = paged("orderable_items", page)?;

    let ttl = state.cache().catalog_ttl_secs;
    if let Err(e) = state.cache().set_json(&cache_key, &body, ttl).await {
        warn!("Catalog cache write failed: {}", e);
    }
    Ok(Json(body))
}

pub async fn create_order(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    body: JsonBody,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    user.require("order:create")?;
    if !body.has("orderable_item_id") || !body.has("order_details") {
        return Err(ApiError::message(
            StatusCode::BAD_REQUEST,
            "orderable_item_id and order_details are required",
        ));
    }
    let patient = state
        .db()
        .find_patient(&patient_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let item_id = body.text_lossy("orderable_item_id").unwrap_or_default();
    let item = state
        .db()
        .find_orderable_item(&item_id)
        .await?
        .ok_or_else(|| ApiError::message(StatusCode::NOT_FOUND, "Orderable item not found"))?;

    let order_details = body.0.get("order_details").cloned().unwrap_or(Value::Null);
    let alerts = cds::run_checks(state.db(), &patient.id, &item, &order_details).await?;
    if alerts.iter().any(|a| a.is_critical()) {
        return Err(ApiError::Body(
            StatusCode::BAD_REQUEST,
            json!({
                "message": "Order blocked by critical CDS alert(s).",
                "cds_alerts": alerts,
            }),
        ));
    }

    let order = state
        .db()
        .insert_order(&NewOrder {
            patient_id: patient.id.clone(),
            orderable_item_id: item.id.clone(),
            order_details,
            priority: body.text("priority").unwrap_or("Routine").to_string(),
            ordering_physician_id: user.id(),
        })
        .await?;
    info!("Order {} placed for patient {} by user {}", order.id, patient.id, user.id());

    if item.is_medication() {
        let pharmacists = state.db().group_member_ids(PHARMACY_GROUP).await?;
        state
            .notifications
            .notify_pharmacy_new_order(&order.id, &patient.id, &patient.full_name(), &item.name, pharmacists)
            .await;
    }
    if !user.has("order:sign") {
        match patient.attending_physician_id {
            Some(attending) => {
                let description = format!("{} for {}", item.name, patient.full_name());
                state
                    .notifications
                    .notify_order_signature_required(&order.id, attending, &patient.id, &description)
                    .await;
            }
            None => warn!("Order {} needs a signature but patient {} has no attending physician", order.id, patient.id),
        }
    }

    let mut response = MessageResponse::new("Order created successfully and is pending signature.")
        .with("order_id", &order.id);
    if !alerts.is_empty() {
        response = response.with("cds_warnings", to_json(&alerts)?);
    }
    Ok(created(response))
}

pub async fn list_patient_orders(
    State(state): State<ApiState>,
    Path(patient_id): Path<String>,
    user: CurrentUser,
    Query(params): Query<OrderListQuery>,
) -> ApiResult<Json<Value>> {
    user.require("order:read")?;
    if !state.db().patient_exists(&patient_id).await? {
        return Err(ApiError::NotFound);
    }
    let status_filter = params.status.as_deref().filter(|s| !s.is_empty());
    let page = state
        .db()
        .list_patient_orders(&patient_id, status_filter, params.pagination.resolve(20))
        .await?;
    paged("orders", page)
}

const NOT_SIGNABLE: &str = "Only orders with status 'PendingSignature' can be signed.";
const NOT_DISCONTINUABLE: &str = "Only 'Active' or 'PendingSignature' orders can be discontinued.";

async fn order_or_404(state: &ApiState, order_id: &str) -> ApiResult<Order> {
    state.db().find_order(order_id).await?.ok_or(ApiError::NotFound)
}

pub async fn sign_order(
    State(state): State<ApiState>,
    Path(order_id): Path<String>,
    user: CurrentUser,
    Client(client): Client,
) -> ApiResult<Json<MessageResponse>> {
    user.require("order:sign")?;
    let order = order_or_404(&state, &order_id).await?;
    let not_pending = || ApiError::message(StatusCode::BAD_REQUEST, NOT_SIGNABLE);
    if order.status != status::PENDING_SIGNATURE {
        return Err(not_pending());
    }

    let item = state.db().find_orderable_item(&order.orderable_item_id).await?;
    if !state.db().sign_order(&order, item.as_ref(), user.id()).await? {
        return Err(not_pending());
    }
    audit::record(
        state.db(),
        AuditEvent::new(action::ORDER_STATUS_CHANGE, Some(&user.user), &client)
            .target("Order", &order.id)
            .details(audit::status_change(&order.status, status::ACTIVE)),
    )
    .await;
    info!("Order {} signed by user {}", order.id, user.id());

    Ok(Json(
        MessageResponse::new("Order signed successfully.")
            .with("order_id", &order.id)
            .with("status", status::ACTIVE),
    ))
}

pub async fn discontinue_order(
    State(state): State<ApiState>,
    Path(order_id): Path<String>,
    user: CurrentUser,
    Client(client): Client,
    body: Result<JsonBody, ApiError>,
) -> ApiResult<Json<MessageResponse>> {
    user.require("order:discontinue")?;
    let order = order_or_404(&state, &order_id).await?;
    let not_open = || ApiError::message(StatusCode::BAD_REQUEST, NOT_DISCONTINUABLE);
    if order.status != status::ACTIVE && order.status != status::PENDING_SIGNATURE {
        return Err(not_open());
    }

    let reason = body
        .ok()
        .and_then(|b| b.text("reason").map(String::from))
        .unwrap_or_else(|| "Discontinued by physician order.".to_string());
    if !state.db().discontinue_order(&order.id, user.id(), &reason).await? {
        return Err(not_open());
    }
    audit::record(
        state.db(),
        AuditEvent::new(action::ORDER_STATUS_CHANGE, Some(&user.user), &client)
            .target("Order", &order.id)
            .details(audit::status_change(&order.status, status::DISCONTINUED)),
    )
    .await;
    info!("Order {} discontinued by user {}", order.id, user.id());

    Ok(Json(
        MessageResponse::new("Order discontinued.").with("order_id", &order.id),
    ))
}
