//! API response types

use super::error::{ApiError, ApiResult};
use crate::core::Page;
use axum::{http::StatusCode, response::Json};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// `{"message": ...}` with any extra keys
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extra: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.extra.insert(key.to_string(), value);
        }
        self
    }
}

pub fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse::new(text))
}

pub fn created<T: Serialize>(body: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(body))
}

pub fn to_json<T: Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!("Failed to serialize response: {}", e);
        ApiError::Internal
    })
}

/// A page rendered as `{<key>: [...], total, page, per_page, pages}`
pub fn paged<T: Serialize>(key: &str, page: Page<T>) -> ApiResult<Json<Value>> {
    let pages = page.pages();
    let items = to_json(&page.items)?;
    Ok(Json(json!({
        key: items,
        "total": page.total,
        "page": page.pagination.page,
        "per_page": page.pagination.per_page,
        "pages": pages,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Pagination;

    #[test]
    fn paged_body_carries_counters() {
        let page = Page::new(vec!["a", "b"], 12, Pagination { page: 2, per_page: 5 });
        let Json(body) = paged("tasks", page).unwrap();
        assert_eq!(body["tasks"], json!(["a", "b"]));
        assert_eq!(body["total"], 12);
        assert_eq!(body["page"], 2);
        assert_eq!(body["pages"], 3);
    }

    #[test]
    fn message_with_extra_keys() {
        let body = serde_json::to_value(MessageResponse::new("Task created successfully").with("task_id", "t1")).unwrap();
        assert_eq!(body, json!({ "message": "Task created successfully", "task_id": "t1" }));
    }
}
