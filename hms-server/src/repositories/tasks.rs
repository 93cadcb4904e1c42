//! Clinical tasks

use crate::core::{HmsError, HmsResult, Page, Pagination};
use crate::database::PostgresManager;
use crate::models::{NewTask, Task, TaskStatusSummary};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const TASK_SELECT: &str = r#"
    SELECT t.id, t.title, t.description, t.due_datetime, t.patient_id,
           t.assigned_to_user_id, a.username AS assigned_to_username,
           t.created_by_user_id, c.username AS created_by_username,
           t.priority, t.category, t.department, t.status, t.completed, t.completed_at,
           t.is_urgent, t.visibility, t.created_at, t.updated_at
    FROM tasks t
    LEFT JOIN users a ON a.id = t.assigned_to_user_id
    LEFT JOIN users c ON c.id = t.created_by_user_id
"#;

const TASK_FILTER: &str = r#"
    WHERE ($1::int IS NULL OR t.assigned_to_user_id = $1)
      AND ($2::text IS NULL OR t.patient_id = $2)
      AND ($3::bool IS NULL OR t.completed = $3)
      AND ($4::text IS NULL OR t.priority ILIKE '%' || $4 || '%')
      AND ($5::text IS NULL OR t.department ILIKE '%' || $5 || '%')
"#;

/// Resolved task list filters; visibility scoping is applied by the caller
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub assigned_to_user_id: Option<i32>,
    pub patient_id: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<String>,
    pub department: Option<String>,
}

impl PostgresManager {
    pub async fn insert_task(&self, task: &NewTask) -> HmsResult<Task> {
        let id = Uuid::new_v4().to_string();
        let query = r#"
            INSERT INTO tasks (
                id, title, description, due_datetime, patient_id, assigned_to_user_id,
                created_by_user_id, priority, category, department, status, is_urgent, visibility
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#;
        sqlx::query(query)
            .bind(&id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.due_datetime)
            .bind(&task.patient_id)
            .bind(task.assigned_to_user_id)
            .bind(task.created_by_user_id)
            .bind(&task.priority)
            .bind(&task.category)
            .bind(&task.department)
            .bind(&task.status)
            .bind(task.is_urgent)
            .bind(&task.visibility)
            .execute(&self.pool)
            .await?;

        self.find_task(&id)
            .await?
            .ok_or_else(|| HmsError::not_found("Task"))
    }

    pub async fn find_task(&self, task_id: &str) -> HmsResult<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(&format!("{} WHERE t.id = $1", TASK_SELECT))
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    /// Write back a task and return it with fresh usernames
    pub async fn save_task(&self, task: &Task) -> HmsResult<Task> {
        let query = r#"
            UPDATE tasks SET
                title = $2, description = $3, due_datetime = $4, patient_id = $5,
                assigned_to_user_id = $6, priority = $7, category = $8, department = $9,
                status = $10, completed = $11, completed_at = $12, is_urgent = $13,
                visibility = $14, updated_at = NOW()
            WHERE id = $1
        "#;
        sqlx::query(query)
            .bind(&task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.due_datetime)
            .bind(&task.patient_id)
            .bind(task.assigned_to_user_id)
            .bind(&task.priority)
            .bind(&task.category)
            .bind(&task.department)
            .bind(&task.status)
            .bind(task.completed)
            .bind(task.completed_at)
            .bind(task.is_urgent)
            .bind(&task.visibility)
            .execute(&self.pool)
            .await?;

        self.find_task(&task.id)
            .await?
            .ok_or_else(|| HmsError::not_found("Task"))
    }

    pub async fn delete_task(&self, task_id: &str) -> HmsResult<()> {
        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Due soonest first (undated last), then newest
    pub async fn list_tasks(&self, filter: &TaskFilter, pagination: Pagination) -> HmsResult<Page<Task>> {
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM tasks t {}", TASK_FILTER))
            .bind(filter.assigned_to_user_id)
            .bind(&filter.patient_id)
            .bind(filter.completed)
            .bind(&filter.priority)
            .bind(&filter.department)
            .fetch_one(&self.pool)
            .await?;

        let query = format!(
            "{} {} ORDER BY t.due_datetime ASC NULLS LAST, t.created_at DESC LIMIT $6 OFFSET $7",
            TASK_SELECT, TASK_FILTER
        );
        let tasks = sqlx::query_as::<_, Task>(&query)
            .bind(filter.assigned_to_user_id)
            .bind(&filter.patient_id)
            .bind(filter.completed)
            .bind(&filter.priority)
            .bind(&filter.department)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(tasks, total, pagination))
    }

    /// Open tasks for a user due inside the given window
    pub async fn tasks_due_between(
        &self,
        user_id: i32,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> HmsResult<Vec<Task>> {
        let query = format!(
            r#"{}
            WHERE t.assigned_to_user_id = $1
              AND t.due_datetime >= $2 AND t.due_datetime <= $3
              AND t.completed = FALSE
            ORDER BY t.due_datetime ASC NULLS LAST"#,
            TASK_SELECT
        );
        let tasks = sqlx::query_as::<_, Task>(&query)
            .bind(user_id)
            .bind(from)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    pub async fn task_status_summary(&self) -> HmsResult<(i64, TaskStatusSummary)> {
        let query = r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'Pending' AND completed = FALSE),
                COUNT(*) FILTER (WHERE status = 'In Progress' AND completed = FALSE),
                COUNT(*) FILTER (WHERE status = 'Completed' AND completed = TRUE),
                COUNT(*) FILTER (WHERE status = 'Cancelled'),
                COUNT(*) FILTER (WHERE status = 'On Hold')
            FROM tasks
        "#;
        let (total, pending, in_progress, completed, cancelled, on_hold): (i64, i64, i64, i64, i64, i64) =
            sqlx::query_as(query).fetch_one(&self.pool).await?;

        Ok((
            total,
            TaskStatusSummary {
                pending,
                in_progress,
                completed,
                cancelled,
                on_hold,
            },
        ))
    }

    /// Dashboard list: urgent first, then due soonest
    pub async fn open_tasks_for(&self, user_id: i32, limit: i64) -> HmsResult<Vec<Task>> {
        let query = format!(
            r#"{}
            WHERE t.assigned_to_user_id = $1 AND t.completed = FALSE
            ORDER BY t.is_urgent DESC, t.due_datetime ASC NULLS LAST
            LIMIT $2"#,
            TASK_SELECT
        );
        let tasks = sqlx::query_as::<_, Task>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }
}
