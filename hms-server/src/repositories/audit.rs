use crate::core::HmsResult;
use crate::database::PostgresManager;
use crate::models::AuditEvent;

impl PostgresManager {
    pub async fn insert_audit_event(&self, event: &AuditEvent) -> HmsResult<i64> {
        let query = r#"
            INSERT INTO audit_logs (
                user_id, user_username, action, target_model, target_id, change_details,
                ip_address, user_agent
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
        "#;
        let id: i64 = sqlx::query_scalar(query)
            .bind(event.user_id)
            .bind(&event.user_username)
            .bind(event.action)
            .bind(&event.target_model)
            .bind(&event.target_id)
            .bind(&event.change_details)
            .bind(&event.ip_address)
            .bind(&event.user_agent)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }
}
