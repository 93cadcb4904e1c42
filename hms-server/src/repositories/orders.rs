//! Orderable catalog, orders and CDS rules

use crate::core::{HmsResult, Page, Pagination};
use crate::database::PostgresManager;
use crate::models::order::status;
use crate::models::{CdsRule, NewOrder, Order, OrderListEntry, OrderableItem};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

const ITEM_COLUMNS: &str = r#"
    id, item_type, name, generic_name, code, is_active, parent_id,
    min_dose, max_dose, default_dose_unit
"#;

const ORDER_COLUMNS: &str = r#"
    id, patient_id, orderable_item_id, order_details, priority, status, ordering_physician_id,
    order_placed_at, signed_at, signed_by_user_id, discontinued_at, discontinued_by_user_id,
    discontinuation_reason, reviewed_by_nurse_id, reviewed_at, administration_instructions,
    notes, is_critical
"#;

const RULE_COLUMNS: &str = r#"
    id, rule_name, description, rule_type, rule_logic, is_active, created_at, updated_at
"#;

impl PostgresManager {
    /// Active catalog items whose name and type contain the given fragments
    pub async fn search_orderable_items(
        &self,
        name_fragment: Option<&str>,
        item_type: Option<&str>,
        pagination: Pagination,
    ) -> HmsResult<Page<OrderableItem>> {
        let filter = r#"
            FROM orderable_items
            WHERE is_active = TRUE
              AND ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR item_type ILIKE '%' || $2 || '%')
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {}", filter))
            .bind(name_fragment)
            .bind(item_type)
            .fetch_one(&self.pool)
            .await?;

        let query = format!(
            "SELECT {} {} ORDER BY name LIMIT $3 OFFSET $4",
            ITEM_COLUMNS, filter
        );
        let items = sqlx::query_as::<_, OrderableItem>(&query)
            .bind(name_fragment)
            .bind(item_type)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(items, total, pagination))
    }

    pub async fn find_orderable_item(&self, item_id: &str) -> HmsResult<Option<OrderableItem>> {
        let query = format!("SELECT {} FROM orderable_items WHERE id = $1", ITEM_COLUMNS);
        let item = sqlx::query_as::<_, OrderableItem>(&query)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    pub async fn insert_order(&self, order: &NewOrder) -> HmsResult<Order> {
        let query = format!(
            r#"
            INSERT INTO orders (
                id, patient_id, orderable_item_id, order_details, priority, status, ordering_physician_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        );
        let created = sqlx::query_as::<_, Order>(&query)
            .bind(Uuid::new_v4().to_string())
            .bind(&order.patient_id)
            .bind(&order.orderable_item_id)
            .bind(&order.order_details)
            .bind(&order.priority)
            .bind(status::PENDING_SIGNATURE)
            .bind(order.ordering_physician_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    pub async fn find_order(&self, order_id: &str) -> HmsResult<Option<Order>> {
        let query = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    pub async fn list_patient_orders(
        &self,
        patient_id: &str,
        status_filter: Option<&str>,
        pagination: Pagination,
    ) -> HmsResult<Page<OrderListEntry>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM orders
            WHERE patient_id = $1 AND ($2::text IS NULL OR status ILIKE '%' || $2 || '%')
            "#,
        )
        .bind(patient_id)
        .bind(status_filter)
        .fetch_one(&self.pool)
        .await?;

        let query = r#"
            SELECT o.id AS order_id,
                   o.orderable_item_id,
                   COALESCE(oi.name, 'Unknown') AS orderable_item_name,
                   o.order_details,
                   o.status,
                   o.priority,
                   o.ordering_physician_id,
                   u.full_name AS ordering_physician_name,
                   o.order_placed_at AS placed_at,
                   o.signed_at,
                   o.signed_by_user_id
            FROM orders o
            LEFT JOIN orderable_items oi ON oi.id = o.orderable_item_id
            LEFT JOIN users u ON u.id = o.ordering_physician_id
            WHERE o.patient_id = $1
              AND ($2::text IS NULL OR o.status ILIKE '%' || $2 || '%')
            ORDER BY o.order_placed_at DESC
            LIMIT $3 OFFSET $4
        "#;
        let entries = sqlx::query_as::<_, OrderListEntry>(query)
            .bind(patient_id)
            .bind(status_filter)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(entries, total, pagination))
    }

    /// Move a pending order to Active. Signing a medication order also starts
    /// the matching inpatient medication, in the same transaction. Returns
    /// false when the order was no longer pending.
    pub async fn sign_order(
        &self,
        order: &Order,
        item: Option<&OrderableItem>,
        signer_id: i32,
    ) -> HmsResult<bool> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE orders SET status = $2, signed_at = $3, signed_by_user_id = $4 WHERE id = $1 AND status = $5",
        )
        .bind(&order.id)
        .bind(status::ACTIVE)
        .bind(now)
        .bind(signer_id)
        .bind(status::PENDING_SIGNATURE)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(item) = item.filter(|i| i.is_medication()) {
            let details = order.order_details.as_ref();
            let detail = |key: &str| -> Option<String> {
                details.and_then(|d| d.get(key)).and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
            };
            let dose = match (detail("dose"), detail("unit")) {
                (Some(dose), Some(unit)) => Some(format!("{} {}", dose, unit)),
                (dose, _) => dose,
            };

            let query = r#"
                INSERT INTO patient_medications (
                    id, patient_id, orderable_item_id, medication_name, type, dose, route,
                    frequency, indication, start_datetime, status, source_of_information,
                    recorded_by_user_id, source_order_id
                ) VALUES ($1, $2, $3, $4, 'INPATIENT_ACTIVE', $5, $6, $7, $8, $9, 'Active', 'Order', $10, $11)
            "#;
            sqlx::query(query)
                .bind(Uuid::new_v4().to_string())
                .bind(&order.patient_id)
                .bind(&item.id)
                .bind(&item.name)
                .bind(dose)
                .bind(detail("route"))
                .bind(detail("frequency"))
                .bind(detail("indication"))
                .bind(now)
                .bind(signer_id)
                .bind(&order.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Stop an order and any inpatient medication it started. Returns false
    /// when the order was neither Active nor pending.
    pub async fn discontinue_order(&self, order_id: &str, user_id: i32, reason: &str) -> HmsResult<bool> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let query = r#"
            UPDATE orders
            SET status = $2, discontinued_at = $3, discontinued_by_user_id = $4, discontinuation_reason = $5
            WHERE id = $1 AND status IN ($6, $7)
        "#;
        let updated = sqlx::query(query)
            .bind(order_id)
            .bind(status::DISCONTINUED)
            .bind(now)
            .bind(user_id)
            .bind(reason)
            .bind(status::ACTIVE)
            .bind(status::PENDING_SIGNATURE)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let query = r#"
            UPDATE patient_medications
            SET status = 'Discontinued', end_datetime = $2
            WHERE source_order_id = $1 AND status = 'Active'
        "#;
        sqlx::query(query)
            .bind(order_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn has_active_order_for_item(&self, patient_id: &str, item_id: &str) -> HmsResult<bool> {
        let query = r#"
            SELECT EXISTS(
                SELECT 1 FROM orders
                WHERE patient_id = $1 AND orderable_item_id = $2 AND status = $3
            )
        "#;
        let exists: bool = sqlx::query_scalar(query)
            .bind(patient_id)
            .bind(item_id)
            .bind(status::ACTIVE)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Lowercased catalog names of the patient's running inpatient medications
    pub async fn active_inpatient_catalog_names(&self, patient_id: &str) -> HmsResult<Vec<String>> {
        let query = r#"
            SELECT DISTINCT LOWER(oi.name)
            FROM patient_medications pm
            JOIN orderable_items oi ON oi.id = pm.orderable_item_id
            WHERE pm.patient_id = $1 AND pm.status = 'Active' AND pm.type = 'INPATIENT_ACTIVE'
        "#;
        let names = sqlx::query_scalar(query)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    pub async fn first_active_rule(&self, rule_type: &str) -> HmsResult<Option<CdsRule>> {
        let query = format!(
            "SELECT {} FROM cds_rules WHERE rule_type = $1 AND is_active = TRUE ORDER BY created_at LIMIT 1",
            RULE_COLUMNS
        );
        let rule = sqlx::query_as::<_, CdsRule>(&query)
            .bind(rule_type)
            .fetch_optional(&self.pool)
            .await?;
        Ok(rule)
    }

    pub async fn list_cds_rules(&self) -> HmsResult<Vec<CdsRule>> {
        let query = format!("SELECT {} FROM cds_rules ORDER BY rule_name", RULE_COLUMNS);
        let rules = sqlx::query_as::<_, CdsRule>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rules)
    }

    pub async fn insert_cds_rule(
        &self,
        rule_name: &str,
        description: Option<&str>,
        rule_type: &str,
        rule_logic: &Value,
        is_active: bool,
    ) -> HmsResult<CdsRule> {
        let query = format!(
            r#"
            INSERT INTO cds_rules (id, rule_name, description, rule_type, rule_logic, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            RULE_COLUMNS
        );
        let rule = sqlx::query_as::<_, CdsRule>(&query)
            .bind(Uuid::new_v4().to_string())
            .bind(rule_name)
            .bind(description)
            .bind(rule_type)
            .bind(rule_logic)
            .bind(is_active)
            .fetch_one(&self.pool)
            .await?;
        Ok(rule)
    }
}
