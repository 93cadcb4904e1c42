//! Core value types shared by handlers and repositories

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 (`Z` or an explicit offset) and naive
/// `YYYY-MM-DDTHH:MM:SS[.ffffff]` values, which are taken as UTC.
pub fn parse_datetime(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Parse either a full timestamp or a bare `YYYY-MM-DD` date (midnight UTC)
pub fn parse_datetime_or_date(input: &str) -> Option<DateTime<Utc>> {
    parse_datetime(input).or_else(|| {
        parse_date(input).map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
    })
}

pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}

/// End of the given day, used for inclusive `end_date` filters
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(time))
}

/// Whole years between a birth date and today
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    use chrono::Datelike;
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

/// Upper bound on `per_page`; larger requests are clamped
pub const MAX_PER_PAGE: i64 = 1000;

/// Raw `page` / `per_page` query values. Unparseable values fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl PaginationQuery {
    pub fn resolve(&self, default_per_page: i64) -> Pagination {
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let per_page = self
            .per_page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(default_per_page)
            .min(MAX_PER_PAGE);
        Pagination { page, per_page }
    }
}

/// Resolved page window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total - 1) / self.per_page + 1
        }
    }
}

/// One page of rows plus the counters every list endpoint reports
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            pagination,
        }
    }

    pub fn pages(&self) -> i64 {
        self.pagination.pages(self.total)
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            pagination: self.pagination,
        }
    }
}

pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Render a JSON value the way a template context expects it
pub fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_naive_and_offset_timestamps() {
        let naive = parse_datetime("2024-03-01T08:30:00").unwrap();
        assert_eq!(naive.hour(), 8);

        let fractional = parse_datetime("2024-03-01T08:30:00.123456").unwrap();
        assert_eq!(fractional.nanosecond(), 123_456_000);

        let zulu = parse_datetime("2024-03-01T08:30:00Z").unwrap();
        assert_eq!(zulu, naive);

        let offset = parse_datetime("2024-03-01T10:30:00+02:00").unwrap();
        assert_eq!(offset, naive);

        assert!(parse_datetime("yesterday").is_none());
        assert!(parse_datetime("").is_none());
    }

    #[test]
    fn bare_dates_become_midnight() {
        let dt = parse_datetime_or_date("2024-05-10").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-05-10T00:00:00+00:00");
        assert!(parse_date("2024-05-10T12:00:00").is_none());
    }

    #[test]
    fn pagination_defaults_and_page_count() {
        let query = PaginationQuery {
            page: Some("abc".into()),
            per_page: None,
        };
        let p = query.resolve(20);
        assert_eq!(p, Pagination { page: 1, per_page: 20 });
        assert_eq!(p.offset(), 0);
        assert_eq!(p.pages(0), 0);
        assert_eq!(p.pages(20), 1);
        assert_eq!(p.pages(21), 2);

        let third = PaginationQuery {
            page: Some("3".into()),
            per_page: Some("10".into()),
        }
        .resolve(20);
        assert_eq!(third.offset(), 20);
    }

    #[test]
    fn huge_page_values_do_not_overflow() {
        let far_page = PaginationQuery {
            page: Some(i64::MAX.to_string()),
            per_page: None,
        }
        .resolve(20);
        assert_eq!(far_page.page, i64::MAX);
        assert_eq!(far_page.offset(), i64::MAX);

        let wide = PaginationQuery {
            page: None,
            per_page: Some(i64::MAX.to_string()),
        }
        .resolve(20);
        assert_eq!(wide.per_page, MAX_PER_PAGE);
        assert_eq!(wide.pages(5), 1);
        assert_eq!(wide.pages(i64::MAX), i64::MAX / MAX_PER_PAGE + 1);
    }

    #[test]
    fn age_respects_birthday() {
        let dob = NaiveDate::from_ymd_opt(1950, 6, 15).unwrap();
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2025, 6, 14).unwrap()), 74);
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()), 75);
    }
}
