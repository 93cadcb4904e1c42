//! Orderable catalog, orders and CDS rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ITEM_TYPE_MEDICATION: &str = "Medication";

/// Order lifecycle states used by the sign/discontinue workflow
pub mod status {
    pub const PENDING_SIGNATURE: &str = "PendingSignature";
    pub const ACTIVE: &str = "Active";
    pub const DISCONTINUED: &str = "Discontinued";
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderableItem {
    pub id: String,
    pub item_type: String,
    pub name: String,
    pub generic_name: Option<String>,
    pub code: Option<String>,
    pub is_active: bool,
    pub parent_id: Option<String>,
    pub min_dose: Option<f64>,
    pub max_dose: Option<f64>,
    pub default_dose_unit: Option<String>,
}

impl OrderableItem {
    pub fn is_medication(&self) -> bool {
        self.item_type == ITEM_TYPE_MEDICATION
    }
}

/// Catalog listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub generic_name: Option<String>,
    pub code: Option<String>,
}

impl From<OrderableItem> for CatalogItem {
    fn from(item: OrderableItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            item_type: item.item_type,
            generic_name: item.generic_name,
            code: item.code,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: String,
    pub patient_id: String,
    pub orderable_item_id: String,
    pub order_details: Option<Value>,
    pub priority: String,
    pub status: String,
    pub ordering_physician_id: i32,
    pub order_placed_at: DateTime<Utc>,
    pub signed_at: Option<DateTime<Utc>>,
    pub signed_by_user_id: Option<i32>,
    pub discontinued_at: Option<DateTime<Utc>>,
    pub discontinued_by_user_id: Option<i32>,
    pub discontinuation_reason: Option<String>,
    pub reviewed_by_nurse_id: Option<i32>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub administration_instructions: Option<String>,
    pub notes: Option<String>,
    pub is_critical: bool,
}

/// Row for the patient order list, joined with catalog and physician names
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderListEntry {
    pub order_id: String,
    pub orderable_item_id: String,
    pub orderable_item_name: String,
    pub order_details: Option<Value>,
    pub status: String,
    pub priority: String,
    pub ordering_physician_id: i32,
    pub ordering_physician_name: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub signed_at: Option<DateTime<Utc>>,
    pub signed_by_user_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub patient_id: String,
    pub orderable_item_id: String,
    pub order_details: Value,
    pub priority: String,
    pub ordering_physician_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CdsRule {
    pub id: String,
    pub rule_name: String,
    pub description: Option<String>,
    pub rule_type: String,
    pub rule_logic: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
