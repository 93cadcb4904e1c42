//! Appointment scheduling rules that do not need the database

use crate::core::types::{end_of_day, parse_date, parse_datetime, parse_datetime_or_date};
use chrono::{DateTime, Utc};

/// Validated booking window, end strictly after start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SlotWindow {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<Self> {
        match (start, end) {
            (Some(start), Some(end)) if end > start => Some(Self { start, end }),
            _ => None,
        }
    }

    pub fn parse(start: &str, end: &str) -> Option<Self> {
        Self::new(parse_datetime(start), parse_datetime(end))
    }

    pub fn overlaps(&self, other: &SlotWindow) -> bool {
        self.start < other.end && self.end > other.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeError {
    InvalidProvider,
    OtherProvider,
}

/// Provider filter for the appointment list.
///
/// Callers without `appointment:read:any` are always pinned to their own
/// schedule and may only name themselves.
pub fn provider_scope(
    requested: Option<&str>,
    caller_id: i32,
    can_read_any: bool,
) -> Result<Option<i32>, ScopeError> {
    let requested = match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<i32>().map_err(|_| ScopeError::InvalidProvider)?),
        None => None,
    };
    match (requested, can_read_any) {
        (Some(id), false) if id != caller_id => Err(ScopeError::OtherProvider),
        (_, false) => Ok(Some(caller_id)),
        (requested, true) => Ok(requested),
    }
}

/// Upper bound for the list filter; a bare date covers the whole day
pub fn end_filter(raw: &str) -> Option<DateTime<Utc>> {
    if !raw.contains('T') {
        if let Some(date) = parse_date(raw) {
            return Some(end_of_day(date));
        }
    }
    parse_datetime_or_date(raw)
}

/// Prefix the existing notes with a cancellation stamp
pub fn cancellation_note(reason: &str, existing: Option<&str>, at: DateTime<Utc>) -> String {
    format!(
        "[CANCELLED on {}] Reason: {}\n---\n{}",
        at.format("%Y-%m-%d %H:%M:%S UTC"),
        reason,
        existing.unwrap_or_default()
    )
    .trim()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    #[test]
    fn window_requires_end_after_start() {
        assert!(SlotWindow::new(Some(at(9, 0)), Some(at(9, 30))).is_some());
        assert!(SlotWindow::new(Some(at(9, 0)), Some(at(9, 0))).is_none());
        assert!(SlotWindow::new(Some(at(10, 0)), Some(at(9, 0))).is_none());
        assert!(SlotWindow::new(None, Some(at(9, 0))).is_none());
        assert!(SlotWindow::parse("2024-03-04T09:00:00Z", "2024-03-04T09:30:00").is_some());
        assert!(SlotWindow::parse("tomorrow", "2024-03-04T09:30:00").is_none());
    }

    #[test]
    fn touching_slots_do_not_overlap() {
        let morning = SlotWindow::new(Some(at(9, 0)), Some(at(10, 0))).unwrap();
        let next = SlotWindow::new(Some(at(10, 0)), Some(at(10, 30))).unwrap();
        let inside = SlotWindow::new(Some(at(9, 15)), Some(at(9, 45))).unwrap();
        assert!(!morning.overlaps(&next));
        assert!(morning.overlaps(&inside));
        assert!(inside.overlaps(&morning));
    }

    #[test]
    fn scope_pins_restricted_callers() {
        assert_eq!(provider_scope(None, 7, false), Ok(Some(7)));
        assert_eq!(provider_scope(Some("7"), 7, false), Ok(Some(7)));
        assert_eq!(provider_scope(Some("8"), 7, false), Err(ScopeError::OtherProvider));
        assert_eq!(provider_scope(Some("abc"), 7, true), Err(ScopeError::InvalidProvider));
        assert_eq!(provider_scope(Some("8"), 7, true), Ok(Some(8)));
        assert_eq!(provider_scope(None, 7, true), Ok(None));
    }

    #[test]
    fn date_only_end_filter_covers_whole_day() {
        let end = end_filter("2024-03-04").unwrap();
        assert_eq!(end.format("%H:%M:%S").to_string(), "23:59:59");
        assert_eq!(end_filter("2024-03-04T12:00:00Z"), Some(at(12, 0)));
        assert!(end_filter("03/04/2024").is_none());
    }

    #[test]
    fn cancellation_stamp_precedes_notes() {
        let note = cancellation_note("Provider ill", Some("Bring labs"), at(8, 5));
        assert_eq!(
            note,
            "[CANCELLED on 2024-03-04 08:05:00 UTC] Reason: Provider ill\n---\nBring labs"
        );
        let bare = cancellation_note("Cancelled by user action.", None, at(8, 5));
        assert!(bare.ends_with("---"));
    }
}
