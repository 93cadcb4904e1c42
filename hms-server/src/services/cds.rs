//! Clinical decision support checks run before an order is placed
//!
//! Facts are gathered from the database once, then [`evaluate`] applies the
//! rules in a fixed order: duplicate order, allergy, drug interaction, dose.
//! Each rule contributes at most one alert.

use crate::core::HmsResult;
use crate::database::PostgresManager;
use crate::models::OrderableItem;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::info;

pub const DRUG_INTERACTION_RULE: &str = "DrugInteraction";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CdsAlert {
    #[serde(rename = "type")]
    pub alert_type: &'static str,
    pub message: String,
    pub severity: Severity,
}

impl CdsAlert {
    fn warning(alert_type: &'static str, message: String) -> Self {
        Self {
            alert_type,
            message,
            severity: Severity::Warning,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Patient facts the rules look at
#[derive(Debug, Clone, Default)]
pub struct PatientFacts {
    pub has_active_duplicate: bool,
    pub active_allergens: Vec<String>,
    /// `rule_logic` of the first active drug-interaction rule
    pub interaction_logic: Option<Value>,
    /// Lowercased catalog names of active inpatient medications
    pub active_medication_names: HashSet<String>,
}

/// Whole numbers keep one decimal place (`500.0`), everything else prints as-is
pub fn format_decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn check_duplicate(item: &OrderableItem, facts: &PatientFacts) -> Option<CdsAlert> {
    facts.has_active_duplicate.then(|| {
        CdsAlert::warning(
            "DUPLICATE_ORDER",
            format!(
                "Warning: An active order for '{}' already exists for this patient.",
                item.name
            ),
        )
    })
}

fn check_allergies(item: &OrderableItem, facts: &PatientFacts) -> Option<CdsAlert> {
    if !item.is_medication() {
        return None;
    }
    let name = item.name.to_lowercase();
    facts
        .active_allergens
        .iter()
        .find(|allergen| name.contains(&allergen.to_lowercase()))
        .map(|allergen| CdsAlert {
            alert_type: "ALLERGY_ALERT",
            message: format!(
                "Critical: Patient has a documented allergy to '{}'. This order for '{}' may be unsafe.",
                allergen, item.name
            ),
            severity: Severity::Critical,
        })
}

fn interaction_pairs(logic: &Value) -> Vec<(&str, &str)> {
    logic
        .get("interactions")
        .and_then(Value::as_array)
        .map(|pairs| {
            pairs
                .iter()
                .filter_map(|pair| match pair.as_array().map(Vec::as_slice) {
                    Some([a, b]) => Some((a.as_str()?, b.as_str()?)),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn check_interactions(item: &OrderableItem, facts: &PatientFacts) -> Option<CdsAlert> {
    if !item.is_medication() {
        return None;
    }
    let logic = facts.interaction_logic.as_ref()?;
    let new_name = item.name.to_lowercase();
    let active = &facts.active_medication_names;

    let hit = interaction_pairs(logic).into_iter().any(|(drug1, drug2)| {
        (drug1.contains(new_name.as_str()) && active.contains(drug2))
            || (drug2.contains(new_name.as_str()) && active.contains(drug1))
    });

    hit.then(|| {
        CdsAlert::warning(
            "DRUG_INTERACTION",
            format!(
                "Warning: Potential interaction between the new order '{}' and an existing medication. Please review patient's medication list.",
                item.name
            ),
        )
    })
}

fn check_dose(item: &OrderableItem, order_details: &Value) -> Option<CdsAlert> {
    if !item.is_medication() {
        return None;
    }
    let max_dose = item.max_dose.filter(|max| *max != 0.0)?;
    let dose = match order_details.get("dose")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let unit = order_details.get("unit").and_then(Value::as_str);
    let default_unit = item.default_dose_unit.as_deref().filter(|u| !u.is_empty());

    if let (Some(unit), Some(default_unit)) = (unit.filter(|u| !u.is_empty()), default_unit) {
        if unit.to_lowercase() != default_unit.to_lowercase() {
            return Some(CdsAlert::warning(
                "DOSE_UNIT_MISMATCH",
                format!(
                    "Warning: The ordered unit '{}' does not match the default unit '{}' for {}.",
                    unit, default_unit, item.name
                ),
            ));
        }
    }

    let min_dose = item.min_dose.filter(|min| *min != 0.0);
    let lower = min_dose.unwrap_or(0.0);
    if lower <= dose && dose <= max_dose {
        return None;
    }

    Some(CdsAlert::warning(
        "DOSE_RANGE_ALERT",
        format!(
            "Warning: The ordered dose of {} {} is outside the recommended range of {}-{} {} for {}.",
            format_decimal(dose),
            unit.unwrap_or("None"),
            min_dose.map(format_decimal).unwrap_or_else(|| "0".to_string()),
            format_decimal(max_dose),
            item.default_dose_unit.as_deref().unwrap_or("None"),
            item.name
        ),
    ))
}

/// Apply every rule in order
pub fn evaluate(item: &OrderableItem, order_details: &Value, facts: &PatientFacts) -> Vec<CdsAlert> {
    [
        check_duplicate(item, facts),
        check_allergies(item, facts),
        check_interactions(item, facts),
        check_dose(item, order_details),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Load the patient facts and evaluate every rule for a prospective order
pub async fn run_checks(
    db: &PostgresManager,
    patient_id: &str,
    item: &OrderableItem,
    order_details: &Value,
) -> HmsResult<Vec<CdsAlert>> {
    let mut facts = PatientFacts {
        has_active_duplicate: db.has_active_order_for_item(patient_id, &item.id).await?,
        ..PatientFacts::default()
    };

    if item.is_medication() {
        facts.active_allergens = db.active_allergen_names(patient_id).await?;
        if let Some(rule) = db.first_active_rule(DRUG_INTERACTION_RULE).await? {
            facts.interaction_logic = Some(rule.rule_logic);
            facts.active_medication_names = db
                .active_inpatient_catalog_names(patient_id)
                .await?
                .into_iter()
                .collect();
        }
    }

    let alerts = evaluate(item, order_details, &facts);
    info!(
        "CDS checks for patient {} on item {} resulted in {} alert(s)",
        patient_id,
        item.name,
        alerts.len()
    );
    Ok(alerts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn medication(name: &str) -> OrderableItem {
        OrderableItem {
            id: "item-1".into(),
            item_type: "Medication".into(),
            name: name.into(),
            generic_name: None,
            code: None,
            is_active: true,
            parent_id: None,
            min_dose: None,
            max_dose: None,
            default_dose_unit: None,
        }
    }

    #[test]
    fn no_facts_no_alerts() {
        let alerts = evaluate(&medication("Aspirin"), &json!({}), &PatientFacts::default());
        assert!(alerts.is_empty());
    }

    #[test]
    fn allergy_is_critical_and_case_insensitive() {
        let facts = PatientFacts {
            active_allergens: vec!["Penicillin".into()],
            ..Default::default()
        };
        let alerts = evaluate(&medication("penicillin V potassium"), &json!({}), &facts);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, "ALLERGY_ALERT");
        assert!(alerts[0].is_critical());
        assert!(alerts[0].message.contains("allergy to 'Penicillin'"));
    }

    #[test]
    fn allergy_ignored_for_non_medications() {
        let mut item = medication("Penicillin skin test");
        item.item_type = "Lab".into();
        let facts = PatientFacts {
            active_allergens: vec!["penicillin".into()],
            ..Default::default()
        };
        assert!(evaluate(&item, &json!({}), &facts).is_empty());
    }

    #[test]
    fn duplicate_comes_first() {
        let facts = PatientFacts {
            has_active_duplicate: true,
            active_allergens: vec!["aspirin".into()],
            ..Default::default()
        };
        let alerts = evaluate(&medication("Aspirin"), &json!({}), &facts);
        let kinds: Vec<_> = alerts.iter().map(|a| a.alert_type).collect();
        assert_eq!(kinds, vec!["DUPLICATE_ORDER", "ALLERGY_ALERT"]);
    }

    #[test]
    fn interaction_against_active_medication() {
        let facts = PatientFacts {
            interaction_logic: Some(json!({"interactions": [["warfarin", "aspirin"]]})),
            active_medication_names: ["warfarin".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let alerts = evaluate(&medication("Aspirin"), &json!({}), &facts);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, "DRUG_INTERACTION");
        assert_eq!(alerts[0].severity, Severity::Warning);

        let quiet = PatientFacts {
            active_medication_names: HashSet::new(),
            ..facts
        };
        assert!(evaluate(&medication("Aspirin"), &json!({}), &quiet).is_empty());
    }

    #[test]
    fn malformed_interaction_pairs_are_skipped() {
        let facts = PatientFacts {
            interaction_logic: Some(json!({"interactions": [["aspirin"], [1, 2], "x"]})),
            active_medication_names: ["aspirin".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert!(evaluate(&medication("Aspirin"), &json!({}), &facts).is_empty());
    }

    #[test]
    fn dose_out_of_range() {
        let mut item = medication("Acetaminophen");
        item.min_dose = Some(325.0);
        item.max_dose = Some(1000.0);
        item.default_dose_unit = Some("mg".into());

        let alerts = evaluate(&item, &json!({"dose": "1500", "unit": "MG"}), &PatientFacts::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(
            alerts[0].message,
            "Warning: The ordered dose of 1500.0 MG is outside the recommended range of 325.0-1000.0 mg for Acetaminophen."
        );

        assert!(evaluate(&item, &json!({"dose": 500, "unit": "mg"}), &PatientFacts::default()).is_empty());
    }

    #[test]
    fn dose_without_minimum_or_unit() {
        let mut item = medication("Ibuprofen");
        item.max_dose = Some(800.0);

        let alerts = evaluate(&item, &json!({"dose": 1200.5}), &PatientFacts::default());
        assert_eq!(
            alerts[0].message,
            "Warning: The ordered dose of 1200.5 None is outside the recommended range of 0-800.0 None for Ibuprofen."
        );
    }

    #[test]
    fn unit_mismatch_wins_over_range() {
        let mut item = medication("Heparin");
        item.max_dose = Some(5000.0);
        item.default_dose_unit = Some("units".into());

        let alerts = evaluate(&item, &json!({"dose": 99999, "unit": "mg"}), &PatientFacts::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, "DOSE_UNIT_MISMATCH");
    }

    #[test]
    fn unparseable_dose_skips_check() {
        let mut item = medication("Heparin");
        item.max_dose = Some(5000.0);
        assert!(evaluate(&item, &json!({"dose": "a lot"}), &PatientFacts::default()).is_empty());
        assert!(evaluate(&item, &json!({}), &PatientFacts::default()).is_empty());
    }

    #[test]
    fn decimal_formatting() {
        assert_eq!(format_decimal(500.0), "500.0");
        assert_eq!(format_decimal(0.25), "0.25");
        assert_eq!(format_decimal(-3.0), "-3.0");
    }
}
