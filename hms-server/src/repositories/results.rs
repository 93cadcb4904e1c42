//! Lab results and imaging reports

use crate::core::{HmsError, HmsResult};
use crate::database::PostgresManager;
use crate::models::{ImagingReport, LabResult, NewImagingReport, NewLabResult};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const LAB_SELECT: &str = r#"
    SELECT l.id, l.patient_id, l.ordered_test_id, l.test_name, l.panel_name, l.value,
           l.value_numeric, l.units, l.reference_range, l.abnormal_flag, l.status,
           l.collection_datetime, l.result_datetime, l.performing_lab, l.acknowledged_at,
           l.acknowledged_by_user_id, u.username AS acknowledged_by_username
    FROM lab_results l
    LEFT JOIN users u ON u.id = l.acknowledged_by_user_id
"#;

const IMAGING_SELECT: &str = r#"
    SELECT i.id, i.patient_id, i.ordered_study_id, i.modality, i.study_description,
           i.study_datetime, i.report_text, i.impression_text, i.status,
           i.reported_by_user_id, r.username AS reported_by_username, i.report_datetime,
           i.acknowledged_at, i.acknowledged_by_user_id, a.username AS acknowledged_by_username
    FROM imaging_reports i
    LEFT JOIN users r ON r.id = i.reported_by_user_id
    LEFT JOIN users a ON a.id = i.acknowledged_by_user_id
"#;

impl PostgresManager {
    pub async fn insert_lab_result(&self, result: &NewLabResult) -> HmsResult<LabResult> {
        let id = Uuid::new_v4().to_string();
        let query = r#"
            INSERT INTO lab_results (
                id, patient_id, ordered_test_id, test_name, panel_name, value, value_numeric,
                units, reference_range, abnormal_flag, status, collection_datetime,
                result_datetime, performing_lab
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#;
        sqlx::query(query)
            .bind(&id)
            .bind(&result.patient_id)
            .bind(&result.ordered_test_id)
            .bind(&result.test_name)
            .bind(&result.panel_name)
            .bind(&result.value)
            .bind(result.value_numeric)
            .bind(&result.units)
            .bind(&result.reference_range)
            .bind(&result.abnormal_flag)
            .bind(&result.status)
            .bind(result.collection_datetime)
            .bind(Utc::now())
            .bind(&result.performing_lab)
            .execute(&self.pool)
            .await?;

        self.find_lab_result(&id)
            .await?
            .ok_or_else(|| HmsError::not_found("LabResult"))
    }

    pub async fn find_lab_result(&self, result_id: &str) -> HmsResult<Option<LabResult>> {
        let result = sqlx::query_as::<_, LabResult>(&format!("{} WHERE l.id = $1", LAB_SELECT))
            .bind(result_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(result)
    }

    pub async fn list_lab_results(&self, patient_id: &str, test_name: Option<&str>) -> HmsResult<Vec<LabResult>> {
        let query = format!(
            r#"{}
            WHERE l.patient_id = $1 AND ($2::text IS NULL OR l.test_name ILIKE '%' || $2 || '%')
            ORDER BY l.result_datetime DESC"#,
            LAB_SELECT
        );
        let results = sqlx::query_as::<_, LabResult>(&query)
            .bind(patient_id)
            .bind(test_name)
            .fetch_all(&self.pool)
            .await?;
        Ok(results)
    }

    pub async fn acknowledge_lab_result(&self, result_id: &str, user_id: i32, at: DateTime<Utc>) -> HmsResult<()> {
        sqlx::query("UPDATE lab_results SET acknowledged_at = $2, acknowledged_by_user_id = $3 WHERE id = $1")
            .bind(result_id)
            .bind(at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_imaging_report(&self, report: &NewImagingReport) -> HmsResult<ImagingReport> {
        let id = Uuid::new_v4().to_string();
        let query = r#"
            INSERT INTO imaging_reports (
                id, patient_id, ordered_study_id, modality, study_description, study_datetime,
                report_text, impression_text, status, reported_by_user_id, report_datetime
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#;
        sqlx::query(query)
            .bind(&id)
            .bind(&report.patient_id)
            .bind(&report.ordered_study_id)
            .bind(&report.modality)
            .bind(&report.study_description)
            .bind(report.study_datetime)
            .bind(&report.report_text)
            .bind(&report.impression_text)
            .bind(&report.status)
            .bind(report.reported_by_user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        self.find_imaging_report(&id)
            .await?
            .ok_or_else(|| HmsError::not_found("ImagingReport"))
    }

    pub async fn find_imaging_report(&self, report_id: &str) -> HmsResult<Option<ImagingReport>> {
        let report = sqlx::query_as::<_, ImagingReport>(&format!("{} WHERE i.id = $1", IMAGING_SELECT))
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(report)
    }

    pub async fn list_imaging_reports(&self, patient_id: &str) -> HmsResult<Vec<ImagingReport>> {
        let query = format!(
            "{} WHERE i.patient_id = $1 ORDER BY i.report_datetime DESC",
            IMAGING_SELECT
        );
        let reports = sqlx::query_as::<_, ImagingReport>(&query)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(reports)
    }

    pub async fn acknowledge_imaging_report(&self, report_id: &str, user_id: i32, at: DateTime<Utc>) -> HmsResult<()> {
        sqlx::query("UPDATE imaging_reports SET acknowledged_at = $2, acknowledged_by_user_id = $3 WHERE id = $1")
            .bind(report_id)
            .bind(at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Results for patients under the given attending physician
    pub async fn recent_lab_results_for_attending(
        &self,
        physician_id: i32,
        since: DateTime<Utc>,
        limit: i64,
    ) -> HmsResult<Vec<LabResult>> {
        let query = format!(
            r#"{}
            JOIN patients p ON p.id = l.patient_id
            WHERE p.attending_physician_id = $1 AND l.result_datetime >= $2
            ORDER BY l.result_datetime DESC
            LIMIT $3"#,
            LAB_SELECT
        );
        let results = sqlx::query_as::<_, LabResult>(&query)
            .bind(physician_id)
            .bind(since)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(results)
    }
}
