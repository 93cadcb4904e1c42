//! System setup and user administration

use super::super::error::{ApiError, ApiResult};
use super::super::extract::{CurrentUser, JsonBody};
use super::super::responses::MessageResponse;
use super::super::ApiState;
use crate::models::UserProfile;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{info, warn};

/// Seed permissions, built-in roles and the sample catalog.
///
/// Until some account holds the SystemAdmin role this runs without a token so
/// a fresh deployment can bootstrap itself.
pub async fn setup_roles_permissions(
    State(state): State<ApiState>,
    user: Result<CurrentUser, ApiError>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    if state.db().system_admin_exists().await? {
        user?.require("admin:manage_system_setup")?;
    } else if user.is_err() {
        warn!("Running role/permission setup without authentication (no SystemAdmin yet)");
    }

    let summary = state.db().seed_roles_and_permissions().await?;
    info!(
        permissions = summary.permissions_created,
        roles = summary.roles_created,
        grants = summary.grants_added,
        orderable_items = summary.orderable_items_created,
        "Roles and permissions seeded"
    );
    if let Err(e) = state.cache().invalidate_catalog().await {
        warn!("Failed to invalidate catalog cache after seeding: {}", e);
    }

    Ok((
        StatusCode::CREATED,
        Json(
            MessageResponse::new("Basic roles and permissions set up/updated successfully.")
                .with("summary", summary),
        ),
    ))
}

pub async fn assign_user_role(
    State(state): State<ApiState>,
    Path(user_id): Path<i32>,
    admin: CurrentUser,
    body: JsonBody,
) -> ApiResult<Json<UserProfile>> {
    admin.require("admin:manage_users")?;

    let role_name = body
        .text("role_name")
        .or_else(|| body.text("role"))
        .ok_or_else(|| ApiError::bad_request("role_name is required."))?;

    let user = state
        .db()
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::error(StatusCode::NOT_FOUND, "User not found."))?;
    let role = state
        .db()
        .find_role_by_name(role_name)
        .await?
        .ok_or_else(|| ApiError::error(StatusCode::NOT_FOUND, "Role not found."))?;

    state.db().assign_role(user.id, &role).await?;
    info!("User {} assigned role {} by {}", user.id, role.name, admin.id());

    let roles = state.db().user_role_names(user.id).await?;
    let permissions = state.db().user_permission_names(user.id).await?;
    Ok(Json(UserProfile::with_access(&user, roles, permissions)))
}
