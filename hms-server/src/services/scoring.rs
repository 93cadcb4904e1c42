//! Derived clinical scores for a vital-sign observation

use crate::core::types::age_on;
use crate::models::{RiskProfile, VitalMeasurements, VitalSign};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedScores {
    pub bmi: Option<f64>,
    pub bp_category: Option<&'static str>,
    pub qsofa_score: u8,
    pub mews_score: u8,
    pub cha2ds2_vasc_score: u8,
    pub timi_score_ua_nstemi: u8,
}

impl DerivedScores {
    pub fn compute(m: &VitalMeasurements, risk: &RiskProfile, today: NaiveDate) -> Self {
        let age = risk.date_of_birth.map(|dob| age_on(dob, today));
        Self {
            bmi: bmi(m),
            bp_category: bp_category(m),
            qsofa_score: qsofa(m),
            mews_score: mews(m),
            cha2ds2_vasc_score: cha2ds2_vasc(risk, age),
            timi_score_ua_nstemi: timi(m, risk, age),
        }
    }
}

/// Observation plus its scores, the shape every vitals endpoint returns
#[derive(Debug, Clone, Serialize)]
pub struct VitalView {
    #[serde(flatten)]
    pub vital: VitalSign,
    #[serde(flatten)]
    pub scores: DerivedScores,
}

impl From<VitalSign> for VitalView {
    fn from(vital: VitalSign) -> Self {
        let scores = DerivedScores::compute(&vital.measurements, &vital.risk, Utc::now().date_naive());
        Self { vital, scores }
    }
}

fn positive<T: PartialOrd + Default + Copy>(value: Option<T>) -> Option<T> {
    value.filter(|v| *v != T::default())
}

pub fn bmi(m: &VitalMeasurements) -> Option<f64> {
    let height = m.height_cm.filter(|h| *h > 0.0)?;
    let weight = positive(m.weight_kg)?;
    let meters = height / 100.0;
    Some((weight / (meters * meters) * 100.0).round() / 100.0)
}

pub fn bp_category(m: &VitalMeasurements) -> Option<&'static str> {
    let s = positive(m.systolic_bp_mmhg)?;
    let d = positive(m.diastolic_bp_mmhg)?;
    let category = if s >= 180 || d >= 120 {
        "Hypertensive Crisis"
    } else if s >= 140 || d >= 90 {
        "Hypertension Stage 2"
    } else if s >= 130 || d >= 80 {
        "Hypertension Stage 1"
    } else if s >= 120 {
        "Elevated"
    } else if s < 90 || d < 60 {
        "Hypotension"
    } else {
        "Normal"
    };
    Some(category)
}

pub fn qsofa(m: &VitalMeasurements) -> u8 {
    let mut score = 0;
    if positive(m.respiratory_rate_rpm).is_some_and(|rr| rr >= 22) {
        score += 1;
    }
    if positive(m.systolic_bp_mmhg).is_some_and(|s| s <= 100) {
        score += 1;
    }
    if let Some(level) = m.consciousness_level.as_deref().filter(|l| !l.is_empty()) {
        let level = level.to_lowercase();
        if level != "alert" && level != "a (alert)" {
            score += 1;
        }
    }
    score
}

/// Modified Early Warning Score
pub fn mews(m: &VitalMeasurements) -> u8 {
    let mut score = 0;

    if let Some(hr) = m.heart_rate_bpm {
        score += match hr {
            i32::MIN..=40 => 2,
            41..=50 => 1,
            101..=110 => 1,
            111..=129 => 2,
            130.. => 3,
            _ => 0,
        };
    }

    if let Some(sbp) = m.systolic_bp_mmhg {
        score += match sbp {
            i32::MIN..=70 => 3,
            71..=80 => 2,
            81..=100 => 1,
            200.. => 2,
            _ => 0,
        };
    }

    if let Some(rr) = m.respiratory_rate_rpm {
        score += match rr {
            i32::MIN..=8 => 2,
            21..=29 => 2,
            30.. => 3,
            _ => 0,
        };
    }

    if let Some(temp) = m.temperature_celsius {
        if temp <= 35.0 || temp >= 38.5 {
            score += 2;
        }
    }

    if let Some(level) = m.consciousness_level.as_deref() {
        let level = level.to_lowercase();
        if level.contains("voice") {
            score += 1;
        } else if level.contains("pain") {
            score += 2;
        } else if level.contains("unresponsive") {
            score += 3;
        }
    }

    score
}

pub fn cha2ds2_vasc(risk: &RiskProfile, age: Option<i32>) -> u8 {
    let mut score = 0;
    if risk.congestive_heart_failure {
        score += 1;
    }
    if risk.hypertension {
        score += 1;
    }
    match age {
        Some(a) if a >= 75 => score += 2,
        Some(a) if a >= 65 => score += 1,
        _ => {}
    }
    if risk.diabetes {
        score += 1;
    }
    if risk.stroke_or_tia {
        score += 2;
    }
    if risk.vascular_disease {
        score += 1;
    }
    if risk
        .gender
        .as_deref()
        .is_some_and(|g| g.eq_ignore_ascii_case("female"))
    {
        score += 1;
    }
    score
}

/// TIMI risk score for UA/NSTEMI, limited to the factors the chart records
pub fn timi(m: &VitalMeasurements, risk: &RiskProfile, age: Option<i32>) -> u8 {
    let mut score = 0;
    if age.is_some_and(|a| a >= 65) {
        score += 1;
    }
    if risk.known_cad {
        score += 1;
    }
    if let Some(ecg) = m.ecg_changes.as_deref() {
        let ecg = ecg.to_lowercase();
        if ecg.contains("st deviation") || ecg.contains("st depression") {
            score += 1;
        }
    }
    if m.troponin_ng_l.is_some_and(|t| t > 0.04) {
        score += 1;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn bmi_rounds_to_two_places() {
        let m = VitalMeasurements {
            weight_kg: Some(70.0),
            height_cm: Some(175.0),
            ..Default::default()
        };
        assert_eq!(bmi(&m), Some(22.86));
        assert_eq!(bmi(&VitalMeasurements { height_cm: Some(0.0), ..m.clone() }), None);
        assert_eq!(bmi(&VitalMeasurements { weight_kg: None, ..m }), None);
    }

    #[test]
    fn bp_categories_first_match_wins() {
        let bp = |s, d| {
            bp_category(&VitalMeasurements {
                systolic_bp_mmhg: Some(s),
                diastolic_bp_mmhg: Some(d),
                ..Default::default()
            })
        };
        assert_eq!(bp(185, 70), Some("Hypertensive Crisis"));
        assert_eq!(bp(118, 92), Some("Hypertension Stage 2"));
        assert_eq!(bp(132, 70), Some("Hypertension Stage 1"));
        assert_eq!(bp(124, 70), Some("Elevated"));
        assert_eq!(bp(85, 70), Some("Hypotension"));
        assert_eq!(bp(110, 55), Some("Hypotension"));
        assert_eq!(bp(110, 70), Some("Normal"));
        assert_eq!(bp_category(&VitalMeasurements::default()), None);
    }

    #[test]
    fn qsofa_counts_each_criterion() {
        let m = VitalMeasurements {
            respiratory_rate_rpm: Some(24),
            systolic_bp_mmhg: Some(95),
            consciousness_level: Some("Voice".into()),
            ..Default::default()
        };
        assert_eq!(qsofa(&m), 3);

        let alert = VitalMeasurements {
            consciousness_level: Some("A (Alert)".into()),
            ..m
        };
        assert_eq!(qsofa(&alert), 2);
        assert_eq!(qsofa(&VitalMeasurements::default()), 0);
    }

    #[test]
    fn mews_bands() {
        let m = VitalMeasurements {
            heart_rate_bpm: Some(115),
            systolic_bp_mmhg: Some(78),
            respiratory_rate_rpm: Some(31),
            temperature_celsius: Some(38.9),
            consciousness_level: Some("P (Pain)".into()),
            ..Default::default()
        };
        assert_eq!(mews(&m), 2 + 2 + 3 + 2 + 2);

        let calm = VitalMeasurements {
            heart_rate_bpm: Some(72),
            systolic_bp_mmhg: Some(120),
            respiratory_rate_rpm: Some(12),
            temperature_celsius: Some(36.8),
            consciousness_level: Some("Alert".into()),
            ..Default::default()
        };
        assert_eq!(mews(&calm), 0);
    }

    #[test]
    fn cha2ds2_vasc_uses_history_age_and_gender() {
        let risk = RiskProfile {
            date_of_birth: NaiveDate::from_ymd_opt(1945, 1, 1),
            gender: Some("Female".into()),
            hypertension: true,
            stroke_or_tia: true,
            ..Default::default()
        };
        let scores = DerivedScores::compute(&VitalMeasurements::default(), &risk, today());
        assert_eq!(scores.cha2ds2_vasc_score, 1 + 2 + 2 + 1);

        let younger = RiskProfile {
            date_of_birth: NaiveDate::from_ymd_opt(1955, 1, 1),
            gender: Some("male".into()),
            ..Default::default()
        };
        assert_eq!(cha2ds2_vasc(&younger, Some(age_on(NaiveDate::from_ymd_opt(1955, 1, 1).unwrap(), today()))), 1);
    }

    #[test]
    fn timi_factors() {
        let m = VitalMeasurements {
            ecg_changes: Some("New ST depression in V4-V6".into()),
            troponin_ng_l: Some(0.05),
            ..Default::default()
        };
        let risk = RiskProfile {
            known_cad: true,
            ..Default::default()
        };
        assert_eq!(timi(&m, &risk, Some(70)), 4);
        assert_eq!(timi(&VitalMeasurements::default(), &RiskProfile::default(), Some(40)), 0);
        let borderline = VitalMeasurements {
            troponin_ng_l: Some(0.04),
            ..Default::default()
        };
        assert_eq!(timi(&borderline, &RiskProfile::default(), None), 0);
    }
}
