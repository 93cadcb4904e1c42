//! Care coordination: rounding notes, shift handoffs, patient flags and
//! discharge plans

pub mod discharge;
pub mod flags;
pub mod handoff;
pub mod rounds;

use crate::api::error::{ApiError, ApiResult};
use crate::core::types::parse_datetime_or_date;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};

fn bad_request(text: impl Into<String>) -> ApiError {
    ApiError::error(StatusCode::BAD_REQUEST, text)
}

fn forbidden(text: &str) -> ApiError {
    ApiError::error(StatusCode::FORBIDDEN, text)
}

/// Optional `start_date`/`end_date` style query bound
fn query_bound(raw: Option<&str>, invalid: &str) -> ApiResult<Option<DateTime<Utc>>> {
    match raw.filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(r) => parse_datetime_or_date(r).map(Some).ok_or_else(|| bad_request(invalid)),
    }
}
