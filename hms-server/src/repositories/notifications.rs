//! Notification inbox storage

use crate::core::{HmsError, HmsResult, Page, Pagination};
use crate::database::PostgresManager;
use crate::models::{NewNotification, Notification, NotificationFilter};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const NOTIFICATION_SELECT: &str = r#"
    SELECT n.id, n.recipient_user_id, n.message, n.notification_type, n.is_read, n.read_at,
           n.created_at, n.link_to_item_type, n.link_to_item_id, n.related_patient_id,
           p.first_name || ' ' || p.last_name AS related_patient_name,
           n.metadata_json, n.is_urgent
    FROM notifications n
    LEFT JOIN patients p ON p.id = n.related_patient_id
"#;

const INBOX_FILTER: &str = r#"
    WHERE n.recipient_user_id = $1
      AND ($2::bool IS NULL OR n.is_read = $2)
      AND ($3::text IS NULL OR n.notification_type ILIKE '%' || $3 || '%')
      AND ($4::bool IS NULL OR n.is_urgent = $4)
"#;

impl PostgresManager {
    /// Same recipient, type, message and link created at or after `since`
    pub async fn recent_duplicate_exists(
        &self,
        notification: &NewNotification,
        since: DateTime<Utc>,
    ) -> HmsResult<bool> {
        let query = r#"
            SELECT EXISTS(
                SELECT 1 FROM notifications
                WHERE recipient_user_id = $1
                  AND notification_type = $2
                  AND message = $3
                  AND link_to_item_type IS NOT DISTINCT FROM $4
                  AND link_to_item_id IS NOT DISTINCT FROM $5
                  AND created_at >= $6
            )
        "#;
        let exists: bool = sqlx::query_scalar(query)
            .bind(notification.recipient_user_id)
            .bind(&notification.notification_type)
            .bind(&notification.message)
            .bind(&notification.link_to_item_type)
            .bind(&notification.link_to_item_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Persist a batch in one transaction. A related patient id that does not
    /// resolve is stored as NULL.
    pub async fn insert_notifications(&self, batch: &[NewNotification]) -> HmsResult<Vec<Notification>> {
        let mut ids = Vec::with_capacity(batch.len());
        let mut tx = self.pool.begin().await?;

        for notification in batch {
            let id = Uuid::new_v4().to_string();
            let query = r#"
                INSERT INTO notifications (
                    id, recipient_user_id, related_patient_id, message, notification_type,
                    link_to_item_type, link_to_item_id, metadata_json, is_urgent
                ) VALUES (
                    $1, $2, (SELECT id FROM patients WHERE id = $3), $4, $5, $6, $7, $8, $9
                )
            "#;
            sqlx::query(query)
                .bind(&id)
                .bind(notification.recipient_user_id)
                .bind(&notification.related_patient_id)
                .bind(&notification.message)
                .bind(&notification.notification_type)
                .bind(&notification.link_to_item_type)
                .bind(&notification.link_to_item_id)
                .bind(&notification.metadata_json)
                .bind(notification.is_urgent)
                .execute(&mut *tx)
                .await?;
            ids.push(id);
        }

        tx.commit().await?;

        let query = format!("{} WHERE n.id = ANY($1) ORDER BY n.created_at", NOTIFICATION_SELECT);
        let stored = sqlx::query_as::<_, Notification>(&query)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(stored)
    }

    /// Newest first, plus the recipient's overall unread count
    pub async fn list_notifications(
        &self,
        recipient_user_id: i32,
        filter: &NotificationFilter,
        pagination: Pagination,
    ) -> HmsResult<(Page<Notification>, i64)> {
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM notifications n {}",
            INBOX_FILTER
        ))
        .bind(recipient_user_id)
        .bind(filter.is_read)
        .bind(&filter.notification_type)
        .bind(filter.is_urgent)
        .fetch_one(&self.pool)
        .await?;

        let query = format!(
            "{} {} ORDER BY n.created_at DESC LIMIT $5 OFFSET $6",
            NOTIFICATION_SELECT, INBOX_FILTER
        );
        let notifications = sqlx::query_as::<_, Notification>(&query)
            .bind(recipient_user_id)
            .bind(filter.is_read)
            .bind(&filter.notification_type)
            .bind(filter.is_urgent)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        let unread = self.unread_notification_count(recipient_user_id).await?;
        Ok((Page::new(notifications, total, pagination), unread))
    }

    pub async fn unread_notification_count(&self, recipient_user_id: i32) -> HmsResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_user_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Urgent first, then newest
    pub async fn recent_unread_notifications(&self, recipient_user_id: i32, limit: i64) -> HmsResult<Vec<Notification>> {
        let query = format!(
            "{} WHERE n.recipient_user_id = $1 AND n.is_read = FALSE ORDER BY n.is_urgent DESC, n.created_at DESC LIMIT $2",
            NOTIFICATION_SELECT
        );
        let notifications = sqlx::query_as::<_, Notification>(&query)
            .bind(recipient_user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(notifications)
    }

    /// Only returns the notification when it belongs to the recipient
    pub async fn find_notification_for(
        &self,
        notification_id: &str,
        recipient_user_id: i32,
    ) -> HmsResult<Option<Notification>> {
        let query = format!(
            "{} WHERE n.id = $1 AND n.recipient_user_id = $2",
            NOTIFICATION_SELECT
        );
        let notification = sqlx::query_as::<_, Notification>(&query)
            .bind(notification_id)
            .bind(recipient_user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(notification)
    }

    pub async fn mark_notification_read(&self, notification_id: &str, at: DateTime<Utc>) -> HmsResult<Notification> {
        sqlx::query("UPDATE notifications SET is_read = TRUE, read_at = $2 WHERE id = $1")
            .bind(notification_id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        let query = format!("{} WHERE n.id = $1", NOTIFICATION_SELECT);
        sqlx::query_as::<_, Notification>(&query)
            .bind(notification_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| HmsError::not_found("Notification"))
    }

    /// Returns the number of rows flipped to read
    pub async fn mark_all_notifications_read(&self, recipient_user_id: i32, at: DateTime<Utc>) -> HmsResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = $2 WHERE recipient_user_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_notification(&self, notification_id: &str) -> HmsResult<()> {
        sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(notification_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
