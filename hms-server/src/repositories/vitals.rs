//! Vital sign observations, loaded together with the patient's risk profile

use crate::core::{HmsError, HmsResult, Page, Pagination};
use crate::database::PostgresManager;
use crate::models::{VitalMeasurements, VitalSign};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const VITAL_SELECT: &str = r#"
    SELECT v.id, v.patient_id, v.recorded_at, v.recorded_by_user_id,
           u.username AS recorded_by_username,
           v.temperature_celsius, v.heart_rate_bpm, v.respiratory_rate_rpm,
           v.systolic_bp_mmhg, v.diastolic_bp_mmhg, v.oxygen_saturation_percent,
           v.pain_score_0_10, v.weight_kg, v.height_cm, v.blood_glucose_mg_dl,
           v.blood_glucose_mmol_l, v.blood_glucose_type, v.consciousness_level,
           v.patient_position, v.activity_level, v.o2_therapy_device, v.o2_flow_rate_lpm,
           v.fio2_percent, v.troponin_ng_l, v.creatinine_umol_l, v.ecg_changes, v.notes,
           v.updated_at,
           p.date_of_birth, p.gender, p.congestive_heart_failure, p.hypertension,
           p.diabetes, p.stroke_or_tia, p.vascular_disease, p.known_cad
    FROM vital_signs v
    JOIN patients p ON p.id = v.patient_id
    LEFT JOIN users u ON u.id = v.recorded_by_user_id
"#;

const WINDOW_FILTER: &str = r#"
    WHERE v.patient_id = $1
      AND ($2::timestamptz IS NULL OR v.recorded_at >= $2)
      AND ($3::timestamptz IS NULL OR v.recorded_at <= $3)
"#;

impl PostgresManager {
    pub async fn insert_vital_sign(
        &self,
        patient_id: &str,
        recorded_at: DateTime<Utc>,
        recorded_by_user_id: i32,
        m: &VitalMeasurements,
    ) -> HmsResult<VitalSign> {
        let id = Uuid::new_v4().to_string();
        let query = r#"
            INSERT INTO vital_signs (
                id, patient_id, recorded_at, recorded_by_user_id,
                temperature_celsius, heart_rate_bpm, respiratory_rate_rpm, systolic_bp_mmhg,
                diastolic_bp_mmhg, oxygen_saturation_percent, pain_score_0_10, weight_kg,
                height_cm, blood_glucose_mg_dl, blood_glucose_mmol_l, blood_glucose_type,
                consciousness_level, patient_position, activity_level, o2_therapy_device,
                o2_flow_rate_lpm, fio2_percent, troponin_ng_l, creatinine_umol_l,
                ecg_changes, notes
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23, $24, $25, $26
            )
        "#;
        sqlx::query(query)
            .bind(&id)
            .bind(patient_id)
            .bind(recorded_at)
            .bind(recorded_by_user_id)
            .bind(m.temperature_celsius)
            .bind(m.heart_rate_bpm)
            .bind(m.respiratory_rate_rpm)
            .bind(m.systolic_bp_mmhg)
            .bind(m.diastolic_bp_mmhg)
            .bind(m.oxygen_saturation_percent)
            .bind(m.pain_score_0_10)
            .bind(m.weight_kg)
            .bind(m.height_cm)
            .bind(m.blood_glucose_mg_dl)
            .bind(m.blood_glucose_mmol_l)
            .bind(&m.blood_glucose_type)
            .bind(&m.consciousness_level)
            .bind(&m.patient_position)
            .bind(&m.activity_level)
            .bind(&m.o2_therapy_device)
            .bind(m.o2_flow_rate_lpm)
            .bind(m.fio2_percent)
            .bind(m.troponin_ng_l)
            .bind(m.creatinine_umol_l)
            .bind(&m.ecg_changes)
            .bind(&m.notes)
            .execute(&self.pool)
            .await?;

        self.find_vital_sign(&id)
            .await?
            .ok_or_else(|| HmsError::not_found("VitalSign"))
    }

    pub async fn find_vital_sign(&self, vital_id: &str) -> HmsResult<Option<VitalSign>> {
        let vital = sqlx::query_as::<_, VitalSign>(&format!("{} WHERE v.id = $1", VITAL_SELECT))
            .bind(vital_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(vital)
    }

    pub async fn latest_vital_sign(&self, patient_id: &str) -> HmsResult<Option<VitalSign>> {
        let query = format!(
            "{} WHERE v.patient_id = $1 ORDER BY v.recorded_at DESC LIMIT 1",
            VITAL_SELECT
        );
        let vital = sqlx::query_as::<_, VitalSign>(&query)
            .bind(patient_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(vital)
    }

    pub async fn list_vital_signs(
        &self,
        patient_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        pagination: Pagination,
    ) -> HmsResult<Page<VitalSign>> {
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM vital_signs v {}",
            WINDOW_FILTER
        ))
        .bind(patient_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        let query = format!(
            "{} {} ORDER BY v.recorded_at DESC LIMIT $4 OFFSET $5",
            VITAL_SELECT, WINDOW_FILTER
        );
        let vitals = sqlx::query_as::<_, VitalSign>(&query)
            .bind(patient_id)
            .bind(start)
            .bind(end)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(vitals, total, pagination))
    }

    pub async fn save_vital_sign(&self, vital: &VitalSign) -> HmsResult<()> {
        let m = &vital.measurements;
        let query = r#"
            UPDATE vital_signs SET
                recorded_at = $2, temperature_celsius = $3, heart_rate_bpm = $4,
                respiratory_rate_rpm = $5, systolic_bp_mmhg = $6, diastolic_bp_mmhg = $7,
                oxygen_saturation_percent = $8, pain_score_0_10 = $9, weight_kg = $10,
                height_cm = $11, blood_glucose_mg_dl = $12, blood_glucose_mmol_l = $13,
                blood_glucose_type = $14, consciousness_level = $15, patient_position = $16,
                activity_level = $17, o2_therapy_device = $18, o2_flow_rate_lpm = $19,
                fio2_percent = $20, troponin_ng_l = $21, creatinine_umol_l = $22,
                ecg_changes = $23, notes = $24, updated_at = $25
            WHERE id = $1
        "#;
        sqlx::query(query)
            .bind(&vital.id)
            .bind(vital.recorded_at)
            .bind(m.temperature_celsius)
            .bind(m.heart_rate_bpm)
            .bind(m.respiratory_rate_rpm)
            .bind(m.systolic_bp_mmhg)
            .bind(m.diastolic_bp_mmhg)
            .bind(m.oxygen_saturation_percent)
            .bind(m.pain_score_0_10)
            .bind(m.weight_kg)
            .bind(m.height_cm)
            .bind(m.blood_glucose_mg_dl)
            .bind(m.blood_glucose_mmol_l)
            .bind(&m.blood_glucose_type)
            .bind(&m.consciousness_level)
            .bind(&m.patient_position)
            .bind(&m.activity_level)
            .bind(&m.o2_therapy_device)
            .bind(m.o2_flow_rate_lpm)
            .bind(m.fio2_percent)
            .bind(m.troponin_ng_l)
            .bind(m.creatinine_umol_l)
            .bind(&m.ecg_changes)
            .bind(&m.notes)
            .bind(vital.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_vital_sign(&self, vital_id: &str) -> HmsResult<()> {
        sqlx::query("DELETE FROM vital_signs WHERE id = $1")
            .bind(vital_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
