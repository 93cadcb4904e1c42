//! Request extractors: the authenticated caller, client info and JSON bodies

use super::error::{ApiError, ApiResult};
use super::ApiState;
use crate::auth::{format_permission_list, jwt::subject_user_id, Claims};
use crate::models::User;
use crate::services::ClientInfo;
use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::net::SocketAddr;
use tracing::{info, warn};

pub const TOKEN_MISSING: &str = "Token is missing!";
pub const TOKEN_REVOKED: &str = "Token has been revoked (logged out).";
pub const SUBJECT_MISSING: &str = "Invalid token payload (subject missing)!";
pub const SUBJECT_INVALID: &str = "Invalid user ID format in token.";
pub const USER_NOT_FOUND: &str = "User from token not found in database.";
pub const USER_INACTIVE: &str = "User account is inactive.";
pub const BODY_NOT_JSON: &str = "Request body must be JSON.";

/// The authenticated caller. Permissions come from the token, not the database.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub permissions: Vec<String>,
    pub jti: Option<String>,
    pub exp: i64,
}

impl CurrentUser {
    pub fn id(&self) -> i32 {
        self.user.id
    }

    pub fn has(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// 403 unless the token grants `permission`
    pub fn require(&self, permission: &str) -> ApiResult<()> {
        if self.has(permission) {
            Ok(())
        } else {
            Err(ApiError::message(
                StatusCode::FORBIDDEN,
                format!(
                    "Permission '{}' required. You have: {}",
                    permission,
                    format_permission_list(&self.permissions)
                ),
            ))
        }
    }

    /// Full name when set, otherwise the username
    pub fn display_name(&self) -> String {
        self.user
            .full_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.user.username.clone())
    }
}

pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|v| v.split(' ').next())
        .filter(|t| !t.is_empty())
}

/// Decode an access token and resolve its live, active user
pub async fn authenticate(state: &ApiState, token: &str) -> ApiResult<(User, Claims)> {
    let claims = state
        .jwt
        .decode(token)
        .map_err(|e| ApiError::unauthorized(e.message()))?;

    if let Some(jti) = claims.jti.as_deref() {
        if state.db().is_token_blacklisted(jti).await? {
            info!("Attempt to use blacklisted token (jti: {})", jti);
            return Err(ApiError::unauthorized(TOKEN_REVOKED));
        }
    }

    let user_id = match subject_user_id(&claims) {
        None => return Err(ApiError::unauthorized(SUBJECT_MISSING)),
        Some(Err(())) => return Err(ApiError::unauthorized(SUBJECT_INVALID)),
        Some(Ok(id)) => id,
    };

    let user = state
        .db()
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized(USER_NOT_FOUND))?;
    if !user.is_active {
        return Err(ApiError::unauthorized(USER_INACTIVE));
    }
    Ok((user, claims))
}

#[async_trait]
impl FromRequestParts<ApiState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| ApiError::unauthorized(TOKEN_MISSING))?;
        let (user, claims) = authenticate(state, token).await?;
        Ok(CurrentUser {
            user,
            permissions: claims.permissions.unwrap_or_default(),
            jti: claims.jti,
            exp: claims.exp,
        })
    }
}

/// Client address and user agent for the audit trail
pub struct Client(pub ClientInfo);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Client {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Client(ClientInfo::from_parts(&parts.headers, peer)))
    }
}

fn is_json(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
        .unwrap_or(false)
}

/// A JSON request body kept as a raw value.
///
/// Rejects with 415 when the content type is not JSON and 400 when the body
/// does not parse.
#[derive(Debug, Clone)]
pub struct JsonBody(pub Value);

impl JsonBody {
    /// Deserialize into a request struct; shape errors become 400
    pub fn parse<T: DeserializeOwned>(self) -> ApiResult<T> {
        serde_json::from_value(self.0).map_err(|e| {
            warn!("Rejected request body: {}", e);
            ApiError::bad_request("Invalid request body.")
        })
    }

    /// True for `null`, `{}`, `[]` and other empty payloads
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Non-empty string field
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// String field, or a number rendered as text
    pub fn text_lossy(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Integer field, accepting numeric strings
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.get(key).is_some()
    }

    /// Names from `required` whose value is absent or falsy
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|field| self.0.get(*field).map(is_blank).unwrap_or(true))
            .collect()
    }
}

/// Absent-equivalent JSON values: null, false, zero, empty string or collection
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for JsonBody {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_json(req.headers()) {
            return Err(ApiError::error(StatusCode::UNSUPPORTED_MEDIA_TYPE, BODY_NOT_JSON));
        }
        let bytes = axum::body::Bytes::from_request(req, state)
            .await
            .map_err(|_| ApiError::bad_request("Could not read request body."))?;
        if bytes.is_empty() {
            return Ok(JsonBody(Value::Null));
        }
        serde_json::from_slice(&bytes)
            .map(JsonBody)
            .map_err(|_| ApiError::bad_request("Request body is not valid JSON."))
    }
}

/// Route layer rejecting non-JSON writes before authentication runs
pub async fn require_json(req: Request, next: Next) -> Response {
    let writes = matches!(
        *req.method(),
        axum::http::Method::POST | axum::http::Method::PUT | axum::http::Method::PATCH
    );
    if writes && !is_json(req.headers()) {
        return ApiError::error(StatusCode::UNSUPPORTED_MEDIA_TYPE, BODY_NOT_JSON).into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use serde_json::json;

    #[test]
    fn json_content_types() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));
        headers.insert(header::CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
        assert!(is_json(&headers));
        headers.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
        assert!(!is_json(&headers));
    }

    #[test]
    fn missing_fields_treat_falsy_as_absent() {
        let body = JsonBody(json!({ "patient_id": "p1", "provider_user_id": 0, "start_datetime": "" }));
        assert_eq!(
            body.missing(&["patient_id", "provider_user_id", "start_datetime", "end_datetime"]),
            vec!["provider_user_id", "start_datetime", "end_datetime"]
        );
        assert!(JsonBody(json!({})).is_empty());
        assert!(!JsonBody(json!({ "a": 1 })).is_empty());
    }
}
