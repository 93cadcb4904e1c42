//! Registration, login, token lifecycle and password reset

use super::super::error::{ApiError, ApiResult};
use super::super::extract::{Client, CurrentUser, JsonBody, BODY_NOT_JSON};
use super::super::responses::{message, MessageResponse};
use super::super::ApiState;
use crate::auth::{hash_password, verify_password, TokenError, MIN_PASSWORD_LENGTH};
use crate::models::audit::action;
use crate::models::{AuditEvent, User, UserProfile};
use crate::services::audit;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Public endpoints answer a missing or non-JSON body with a 400 message
fn public_body(body: Result<JsonBody, ApiError>) -> ApiResult<JsonBody> {
    match body {
        Ok(body) if !body.is_empty() => Ok(body),
        _ => Err(ApiError::message(StatusCode::BAD_REQUEST, BODY_NOT_JSON)),
    }
}

/// Body for endpoints that treat a bad body like missing fields
fn lenient_body(body: Result<JsonBody, ApiError>) -> JsonBody {
    body.unwrap_or(JsonBody(Value::Null))
}

async fn profile_with_access(state: &ApiState, user: &User) -> ApiResult<UserProfile> {
    let roles = state.db().user_role_names(user.id).await?;
    let permissions = state.db().user_permission_names(user.id).await?;
    Ok(UserProfile::with_access(user, roles, permissions))
}

pub async fn register(
    State(state): State<ApiState>,
    body: Result<JsonBody, ApiError>,
) -> ApiResult<Response> {
    let body = public_body(body)?;
    let (Some(username), Some(email), Some(password)) = (
        body.text("username"),
        body.text("email"),
        body.text("password"),
    ) else {
        return Err(ApiError::message(
            StatusCode::BAD_REQUEST,
            "Username, email, and password are required.",
        ));
    };
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::message(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters long.",
        ));
    }

    let duplicate = ApiError::message(
        StatusCode::CONFLICT,
        "User with this username or email already exists.",
    );
    if state.db().find_user_by_username(username).await?.is_some()
        || state.db().find_user_by_email(email).await?.is_some()
    {
        return Err(duplicate);
    }

    let full_name = body.text("full_name").unwrap_or("");
    let hashed = hash_password(password)?;
    let user = match state.db().create_user(username, email, &hashed, full_name).await {
        Ok(user) => user,
        Err(e) if e.is_unique_violation() => return Err(duplicate),
        Err(e) => {
            error!("Error during registration for {}: {}", username, e);
            return Err(ApiError::message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred during registration.",
            ));
        }
    };

    info!("New user registered: {}", username);
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User registered successfully.").with("user", UserProfile::bare(&user))),
    )
        .into_response())
}

pub async fn login(
    State(state): State<ApiState>,
    Client(client): Client,
    body: Result<JsonBody, ApiError>,
) -> ApiResult<Response> {
    let body = public_body(body)?;
    let (Some(username), Some(password)) = (body.text("username"), body.text("password")) else {
        return Err(ApiError::message(
            StatusCode::BAD_REQUEST,
            "Username and password are required.",
        ));
    };

    let user = state.db().find_user_by_username(username).await?;
    let user = match user {
        Some(user) if verify_password(password, &user.hashed_password) => user,
        _ => {
            warn!("Failed login attempt for username: {}", username);
            let failure = "Invalid username or password.";
            audit::record(
                state.db(),
                AuditEvent::new(action::LOGIN_FAILURE, None, &client)
                    .details(json!({ "username_attempt": username, "message": failure })),
            )
            .await;
            return Err(ApiError::unauthorized(failure));
        }
    };

    if !user.is_active {
        warn!("Inactive user login attempt: {}", username);
        return Err(ApiError::message(StatusCode::FORBIDDEN, "User account is inactive."));
    }
    if user.mfa_enabled {
        info!("MFA required for user: {}", username);
        return Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "message": "MFA verification required.",
                "mfa_required": true,
                "user_id": user.id,
            })),
        )
            .into_response());
    }

    let profile = profile_with_access(&state, &user).await?;
    let permissions = profile.permissions.clone().unwrap_or_default();
    let access = state.jwt.issue_access_token(user.id, permissions)?;
    let refresh = state.jwt.issue_refresh_token(user.id)?;

    audit::record(
        state.db(),
        AuditEvent::new(action::LOGIN_SUCCESS, Some(&user), &client).target("User", user.id),
    )
    .await;
    info!("User '{}' logged in successfully.", username);

    Ok(Json(json!({
        "message": "Login successful.",
        "access_token": access.token,
        "refresh_token": refresh.token,
        "user": profile,
    }))
    .into_response())
}

pub async fn mfa_verify() -> ApiError {
    ApiError::message(
        StatusCode::NOT_IMPLEMENTED,
        "MFA verification logic not fully implemented yet.",
    )
}

pub async fn logout(State(state): State<ApiState>, user: CurrentUser) -> ApiResult<Json<MessageResponse>> {
    user.require("user:logout")?;

    let Some(jti) = user.jti.as_deref() else {
        return Err(ApiError::message(
            StatusCode::BAD_REQUEST,
            "Token JTI could not be determined for logout.",
        ));
    };
    let Some(expires_at) = DateTime::<Utc>::from_timestamp(user.exp, 0) else {
        error!("Could not determine token expiry for JTI {} during logout.", jti);
        return Err(ApiError::message(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to determine token expiry for logout.",
        ));
    };

    if !state.db().blacklist_token(jti, expires_at).await? {
        info!("Token JTI {} already blacklisted.", jti);
        return Ok(message("Already logged out or token revoked."));
    }
    info!("User {} logged out. Token JTI {} blacklisted.", user.id(), jti);
    Ok(message("Logged out successfully."))
}

pub async fn refresh_token(
    State(state): State<ApiState>,
    body: Result<JsonBody, ApiError>,
) -> ApiResult<Json<Value>> {
    let body = lenient_body(body);
    let Some(token) = body.text("refresh_token") else {
        return Err(ApiError::message(StatusCode::BAD_REQUEST, "Refresh token is required."));
    };

    let claims = state.jwt.decode_refresh(token).map_err(|e| match e {
        TokenError::Expired => ApiError::unauthorized("Refresh token has expired."),
        other => {
            error!("Refresh token error: {:?}", other);
            ApiError::unauthorized("Invalid or malformed refresh token.")
        }
    })?;

    let user_id = crate::auth::jwt::subject_user_id(&claims)
        .and_then(Result::ok)
        .ok_or_else(|| ApiError::unauthorized("Invalid or malformed refresh token."))?;
    let user = match state.db().find_user_by_id(user_id).await? {
        Some(user) if user.is_active => user,
        _ => return Err(ApiError::unauthorized("User not found or inactive.")),
    };

    let permissions = state.db().user_permission_names(user.id).await?;
    let access = state.jwt.issue_access_token(user.id, permissions)?;
    info!("Access token refreshed for user ID: {}", user.id);
    Ok(Json(json!({ "access_token": access.token })))
}

pub async fn forgot_password(
    State(state): State<ApiState>,
    body: Result<JsonBody, ApiError>,
) -> ApiResult<Json<MessageResponse>> {
    let body = lenient_body(body);
    let Some(email) = body.text("email") else {
        return Err(ApiError::message(StatusCode::BAD_REQUEST, "Email address is required."));
    };

    match state.db().find_user_by_email(email).await {
        Ok(Some(user)) if user.is_active => {
            let token = Uuid::new_v4().to_string();
            let hours = state.config.auth.password_reset_hours;
            let expires_at = Utc::now() + Duration::hours(hours);
            match state.db().set_password_reset_token(user.id, &token, expires_at).await {
                Ok(()) => {
                    let reset_url = format!("{}/reset-password?token={}", state.config.server.frontend_url, token);
                    info!(
                        email = %email,
                        reset_url = %reset_url,
                        expires_in_hours = hours,
                        "Password reset email simulated"
                    );
                }
                Err(e) => error!("Error during forgot password for {}: {}", email, e),
            }
        }
        Ok(_) => info!("Password reset requested for unknown or inactive email: {}", email),
        Err(e) => error!("Error during forgot password for {}: {}", email, e),
    }

    Ok(message(
        "If an account with that email exists, a password reset link has been sent.",
    ))
}

pub async fn reset_password(
    State(state): State<ApiState>,
    body: Result<JsonBody, ApiError>,
) -> ApiResult<Json<MessageResponse>> {
    let body = lenient_body(body);
    let (Some(token), Some(new_password)) = (body.text("token"), body.text("new_password")) else {
        return Err(ApiError::message(
            StatusCode::BAD_REQUEST,
            "Token and new password are required.",
        ));
    };
    if new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::message(
            StatusCode::BAD_REQUEST,
            "New password must be at least 8 characters long.",
        ));
    }

    let user = state.db().find_user_by_reset_token(token).await?;
    let user = match user {
        Some(user) if user.password_reset_expires.map(|at| at >= Utc::now()).unwrap_or(false) => user,
        _ => {
            warn!("Invalid or expired password reset token attempt: {}", token);
            return Err(ApiError::message(
                StatusCode::BAD_REQUEST,
                "Password reset token is invalid or has expired.",
            ));
        }
    };

    let hashed = hash_password(new_password)?;
    state.db().reset_password(user.id, &hashed).await?;
    info!("Password reset successfully for user ID: {}", user.id);
    Ok(message("Password has been reset successfully."))
}

pub async fn me(State(state): State<ApiState>, user: CurrentUser) -> ApiResult<Json<UserProfile>> {
    user.require("user:profile:read")?;
    Ok(Json(profile_with_access(&state, &user.user).await?))
}
