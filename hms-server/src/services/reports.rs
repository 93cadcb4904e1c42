//! Operational reports
//!
//! Each builder validates its query window, runs the aggregate queries and
//! returns the JSON body. Validation problems come back as
//! [`ReportError::BadRequest`] so the handler can answer 400; everything else
//! is a [`ReportError::Failed`] that the handler logs and reports as 500.

use crate::core::types::{age_on, end_of_day, parse_date};
use crate::core::HmsError;
use crate::database::PostgresManager;
use crate::models::insight::{LabTrendRow, StayInterval};
use crate::models::task::STATUS_COMPLETED;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error(transparent)]
    Failed(#[from] HmsError),
}

pub type ReportResult = Result<Value, ReportError>;

/// Every query parameter any report understands
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub provider_id: Option<String>,
    pub appointment_type: Option<String>,
    pub test_name: Option<String>,
    pub patient_id: Option<String>,
    pub assigned_to_user_id: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Naive ISO-8601 rendering without an offset, fractional seconds only when set
pub fn iso_naive(at: DateTime<Utc>) -> String {
    at.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub const AGE_GROUPS: [&str; 6] = ["0-17", "18-35", "36-50", "51-65", "66+", "Unknown"];

pub fn age_group(age: i32) -> &'static str {
    match age {
        0..=17 => "0-17",
        18..=35 => "18-35",
        36..=50 => "36-50",
        51..=65 => "51-65",
        66.. => "66+",
        _ => "Unknown",
    }
}

/// Ordered bucket counts, every bucket present even when empty
pub fn age_distribution(birth_dates: &[NaiveDate], today: NaiveDate) -> Map<String, Value> {
    let mut counts: BTreeMap<&str, u64> = AGE_GROUPS.iter().map(|g| (*g, 0)).collect();
    for dob in birth_dates {
        *counts.entry(age_group(age_on(*dob, today))).or_default() += 1;
    }
    AGE_GROUPS
        .iter()
        .map(|group| (group.to_string(), json!(counts.get(group).copied().unwrap_or(0))))
        .collect()
}

/// Completed share of all tasks in percent, two decimals; integer zero when empty
pub fn completion_rate(status_counts: &BTreeMap<String, i64>) -> Value {
    let total: i64 = status_counts.values().sum();
    if total == 0 {
        return json!(0);
    }
    let completed = status_counts.get(STATUS_COMPLETED).copied().unwrap_or(0);
    json!(round2(completed as f64 / total as f64 * 100.0))
}

/// Whole calendar days between admission and discharge; negative stays are dropped
pub fn stay_lengths(intervals: &[StayInterval]) -> Vec<i64> {
    intervals
        .iter()
        .map(|stay| (stay.discharge_date.date_naive() - stay.admission_date.date_naive()).num_days())
        .filter(|days| *days >= 0)
        .collect()
}

pub fn average_stay(lengths: &[i64]) -> Value {
    if lengths.is_empty() {
        return json!(0);
    }
    json!(round2(lengths.iter().sum::<i64>() as f64 / lengths.len() as f64))
}

fn trend_point(row: &LabTrendRow) -> Value {
    json!({
        "date": row.date,
        "average_value": row.avg_value.map(round2),
        "min_value": row.min_value.map(round2),
        "max_value": row.max_value.map(round2),
        "tests_count": row.tests_count,
    })
}

fn required_dates(
    query: &ReportQuery,
    missing: &'static str,
    invalid: &'static str,
) -> Result<(NaiveDate, NaiveDate, String, String), ReportError> {
    let (Some(start_raw), Some(end_raw)) = (present(&query.start_date), present(&query.end_date)) else {
        return Err(ReportError::BadRequest(missing));
    };
    let start = parse_date(start_raw).ok_or(ReportError::BadRequest(invalid))?;
    let end = parse_date(end_raw).ok_or(ReportError::BadRequest(invalid))?;
    Ok((start, end, start_raw.to_string(), end_raw.to_string()))
}

fn optional_id(raw: &Option<String>, invalid: &'static str) -> Result<Option<i32>, ReportError> {
    present(raw)
        .map(|v| v.parse::<i32>().map_err(|_| ReportError::BadRequest(invalid)))
        .transpose()
}

pub async fn patient_demographics(db: &PostgresManager) -> ReportResult {
    let genders: Map<String, Value> = db
        .gender_distribution()
        .await?
        .into_iter()
        .filter_map(|(gender, count)| gender.filter(|g| !g.is_empty()).map(|g| (g, json!(count))))
        .collect();
    let birth_dates = db.patient_birth_dates().await?;

    Ok(json!({
        "report_name": "Patient Demographics Summary",
        "generated_at": iso_naive(Utc::now()),
        "total_patients": birth_dates.len(),
        "gender_distribution": genders,
        "age_group_distribution": age_distribution(&birth_dates, Utc::now().date_naive()),
    }))
}

pub async fn appointment_statistics(db: &PostgresManager, query: &ReportQuery) -> ReportResult {
    let (start, end, _, _) = required_dates(
        query,
        "start_date and end_date query parameters are required (YYYY-MM-DD).",
        "Invalid date format. Use YYYY-MM-DD.",
    )?;
    let from = Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN));
    let until = end_of_day(end);
    if until < from {
        return Err(ReportError::BadRequest("end_date must be after start_date."));
    }
    let provider_id = optional_id(&query.provider_id, "provider_id must be an integer.")?;
    let appointment_type = present(&query.appointment_type);

    let tallies = db
        .appointment_tallies(from, until, provider_id, appointment_type)
        .await?;
    let mut by_status: BTreeMap<&str, u64> = BTreeMap::new();
    let mut by_type: BTreeMap<&str, u64> = BTreeMap::new();
    for tally in &tallies {
        *by_status.entry(tally.status.as_str()).or_default() += 1;
        if let Some(kind) = tally.appointment_type.as_deref().filter(|t| !t.is_empty()) {
            *by_type.entry(kind).or_default() += 1;
        }
    }

    let by_provider = match provider_id {
        Some(_) => json!("Filtered by specific provider"),
        None => {
            let rows = db.appointments_per_provider(from, until, appointment_type).await?;
            let counts: Map<String, Value> = rows
                .into_iter()
                .map(|row| {
                    let name = row
                        .full_name
                        .filter(|n| !n.is_empty())
                        .unwrap_or_else(|| format!("Provider ID {}", row.provider_user_id));
                    (name, json!(row.count))
                })
                .collect();
            Value::Object(counts)
        }
    };

    Ok(json!({
        "report_name": "Appointment Statistics",
        "period_start": iso_naive(from),
        "period_end": iso_naive(until),
        "generated_at": iso_naive(Utc::now()),
        "total_appointments_in_period": tallies.len(),
        "appointments_by_status": by_status,
        "appointments_by_type": by_type,
        "appointments_by_provider": by_provider,
    }))
}

pub async fn lab_result_trends(db: &PostgresManager, query: &ReportQuery) -> ReportResult {
    let (start, end, start_raw, end_raw) = required_dates(
        query,
        "start_date and end_date are required (YYYY-MM-DD)",
        "Invalid date format for start_date/end_date. Use YYYY-MM-DD.",
    )?;
    let test_name = present(&query.test_name);
    let patient_id = present(&query.patient_id);

    let rows = db.lab_result_trend(start, end, test_name, patient_id).await?;
    let trend: Vec<Value> = rows.iter().map(trend_point).collect();

    Ok(json!({
        "report_name": "Lab Result Trends",
        "test_name_filter": test_name.unwrap_or("All Numeric Tests"),
        "patient_id_filter": patient_id.unwrap_or("All Patients"),
        "period_start": start_raw,
        "period_end": end_raw,
        "generated_at": iso_naive(Utc::now()),
        "trend_data": trend,
    }))
}

/// MAR entries grouped by medication and administration status
pub async fn medication_usage(db: &PostgresManager, query: &ReportQuery) -> ReportResult {
    const INVALID: &str = "Invalid date format for start_date/end_date. Use YYYY-MM-DD.";
    let start = present(&query.start_date)
        .map(|raw| parse_date(raw).ok_or(ReportError::BadRequest(INVALID)))
        .transpose()?;
    let end = present(&query.end_date)
        .map(|raw| parse_date(raw).ok_or(ReportError::BadRequest(INVALID)))
        .transpose()?;

    let from = start.map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)));
    let until = end.map(end_of_day);
    let rows = db.medication_usage(from, until).await?;

    let mut by_medication: BTreeMap<&str, i64> = BTreeMap::new();
    for row in &rows {
        *by_medication.entry(row.medication_name.as_str()).or_default() += row.administrations;
    }
    let total: i64 = by_medication.values().sum();

    Ok(json!({
        "report_name": "Medication Usage Report",
        "period_start": present(&query.start_date).unwrap_or("N/A"),
        "period_end": present(&query.end_date).unwrap_or("N/A"),
        "generated_at": iso_naive(Utc::now()),
        "total_administrations": total,
        "administrations_by_medication": by_medication,
        "usage": rows,
    }))
}

pub async fn task_completion(db: &PostgresManager, query: &ReportQuery) -> ReportResult {
    let (start, end, start_raw, end_raw) = required_dates(
        query,
        "start_date and end_date required (YYYY-MM-DD)",
        "Invalid date format for start_date/end_date. Use YYYY-MM-DD.",
    )?;
    let assignee = optional_id(&query.assigned_to_user_id, "assigned_to_user_id must be an integer.")?;

    let status_counts: BTreeMap<String, i64> =
        db.task_status_counts(start, end, assignee).await?.into_iter().collect();
    let total: i64 = status_counts.values().sum();

    Ok(json!({
        "report_name": "Task Completion Report",
        "period_start": start_raw,
        "period_end": end_raw,
        "generated_at": iso_naive(Utc::now()),
        "total_tasks_in_period": total,
        "completion_rate_percent": completion_rate(&status_counts),
        "tasks_by_status": status_counts,
        "assigned_to_filter": present(&query.assigned_to_user_id).unwrap_or("All Users"),
    }))
}

/// Average length of stay, filtered on the discharge date
pub async fn average_length_of_stay(db: &PostgresManager, query: &ReportQuery) -> ReportResult {
    let start = present(&query.start_date)
        .map(|raw| parse_date(raw).ok_or(ReportError::BadRequest("Invalid start_date format.")))
        .transpose()?;
    let end = present(&query.end_date)
        .map(|raw| parse_date(raw).ok_or(ReportError::BadRequest("Invalid end_date format.")))
        .transpose()?;

    let intervals = db.stay_intervals(start, end).await?;
    if intervals.is_empty() {
        return Ok(json!({
            "report_name": "Average Length of Stay Report",
            "message": "No discharged patients found in the specified period with valid admission/discharge dates.",
            "total_patients_discharged": 0,
            "average_length_of_stay_days": 0,
        }));
    }

    let lengths = stay_lengths(&intervals);
    Ok(json!({
        "report_name": "Average Length of Stay Report",
        "period_start_filter_on_discharge": present(&query.start_date).unwrap_or("N/A"),
        "period_end_filter_on_discharge": present(&query.end_date).unwrap_or("N/A"),
        "generated_at": iso_naive(Utc::now()),
        "total_patients_considered_for_alos": lengths.len(),
        "average_length_of_stay_days": average_stay(&lengths),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_buckets_cover_every_group() {
        let today = date(2024, 6, 1);
        let births = [date(2010, 1, 1), date(2000, 1, 1), date(1950, 1, 1), date(1958, 6, 2), date(2030, 1, 1)];
        let dist = age_distribution(&births, today);
        let keys: Vec<_> = dist.keys().cloned().collect();
        assert_eq!(keys, AGE_GROUPS.iter().map(|k| k.to_string()).collect::<Vec<_>>());
        assert_eq!(dist["0-17"], 1);
        assert_eq!(dist["18-35"], 1);
        assert_eq!(dist["36-50"], 0);
        assert_eq!(dist["51-65"], 1);
        assert_eq!(dist["66+"], 1);
        assert_eq!(dist["Unknown"], 1);
    }

    #[test]
    fn completion_rate_rounds_and_handles_empty() {
        let mut counts = BTreeMap::new();
        assert_eq!(completion_rate(&counts), json!(0));
        counts.insert("Completed".to_string(), 1);
        counts.insert("Pending".to_string(), 2);
        assert_eq!(completion_rate(&counts), json!(33.33));
    }

    #[test]
    fn stay_lengths_use_calendar_days() {
        let stays = [
            StayInterval {
                admission_date: Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap(),
                discharge_date: Utc.with_ymd_and_hms(2024, 1, 2, 1, 0, 0).unwrap(),
            },
            StayInterval {
                admission_date: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
                discharge_date: Utc.with_ymd_and_hms(2024, 1, 5, 8, 0, 0).unwrap(),
            },
        ];
        let lengths = stay_lengths(&stays);
        assert_eq!(lengths, vec![1, 4]);
        assert_eq!(average_stay(&lengths), json!(2.5));
        assert_eq!(average_stay(&[]), json!(0));
    }

    #[test]
    fn window_validation_messages() {
        let missing = ReportQuery::default();
        let err = required_dates(&missing, "missing", "invalid").unwrap_err();
        assert!(matches!(err, ReportError::BadRequest("missing")));

        let bad = ReportQuery {
            start_date: Some("2024-01-01".into()),
            end_date: Some("01/31/2024".into()),
            ..Default::default()
        };
        let err = required_dates(&bad, "missing", "invalid").unwrap_err();
        assert!(matches!(err, ReportError::BadRequest("invalid")));
    }

    #[test]
    fn naive_iso_rendering() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(iso_naive(midnight), "2024-01-01T00:00:00");
        assert_eq!(iso_naive(end_of_day(date(2024, 1, 31))), "2024-01-31T23:59:59.999999");
    }

    #[test]
    fn trend_points_round_values() {
        let row = LabTrendRow {
            date: date(2024, 2, 1),
            avg_value: Some(4.126),
            min_value: Some(3.9),
            max_value: None,
            tests_count: 3,
        };
        let point = trend_point(&row);
        assert_eq!(point["date"], "2024-02-01");
        assert_eq!(point["average_value"], 4.13);
        assert!(point["max_value"].is_null());
    }
}
