//! Clinical work items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TASK_STATUSES: [&str; 5] = ["Pending", "In Progress", "Completed", "Cancelled", "On Hold"];
pub const STATUS_PENDING: &str = "Pending";
pub const STATUS_IN_PROGRESS: &str = "In Progress";
pub const STATUS_COMPLETED: &str = "Completed";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_datetime: Option<DateTime<Utc>>,
    pub patient_id: Option<String>,
    pub assigned_to_user_id: Option<i32>,
    pub assigned_to_username: Option<String>,
    pub created_by_user_id: i32,
    pub created_by_username: Option<String>,
    pub priority: String,
    pub category: Option<String>,
    pub department: Option<String>,
    pub status: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_urgent: bool,
    pub visibility: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_participant(&self, user_id: i32) -> bool {
        self.assigned_to_user_id == Some(user_id) || self.created_by_user_id == user_id
    }

    /// Set `status` and keep `completed`/`completed_at` consistent with it
    pub fn apply_status(&mut self, status: &str, now: DateTime<Utc>) {
        self.status = status.to_string();
        if status == STATUS_COMPLETED {
            if !self.completed {
                self.completed = true;
                self.completed_at = Some(now);
            }
        } else if self.completed {
            self.completed = false;
            self.completed_at = None;
        }
    }

    /// Set `completed` and move `status` along with it
    pub fn apply_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        if completed && !self.completed {
            self.completed = true;
            self.completed_at = Some(now);
            self.status = STATUS_COMPLETED.to_string();
        } else if !completed && self.completed {
            self.completed = false;
            self.completed_at = None;
            if self.status == STATUS_COMPLETED {
                self.status = STATUS_IN_PROGRESS.to_string();
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_datetime: Option<DateTime<Utc>>,
    pub patient_id: Option<String>,
    pub assigned_to_user_id: i32,
    pub created_by_user_id: i32,
    pub priority: String,
    pub category: Option<String>,
    pub department: Option<String>,
    pub status: String,
    pub is_urgent: bool,
    pub visibility: String,
}

/// Counts per status for the supervisor summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskStatusSummary {
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub on_hold: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        let now = Utc::now();
        Task {
            id: "t1".into(),
            title: "Check labs".into(),
            description: None,
            due_datetime: None,
            patient_id: None,
            assigned_to_user_id: Some(2),
            assigned_to_username: None,
            created_by_user_id: 1,
            created_by_username: None,
            priority: "Normal".into(),
            category: None,
            department: None,
            status: STATUS_PENDING.into(),
            completed: false,
            completed_at: None,
            is_urgent: false,
            visibility: "private".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn completing_via_status_sets_flag_and_reopening_clears_it() {
        let mut t = task();
        let now = Utc::now();
        t.apply_status("Completed", now);
        assert!(t.completed);
        assert_eq!(t.completed_at, Some(now));

        t.apply_status("In Progress", now);
        assert!(!t.completed);
        assert!(t.completed_at.is_none());
    }

    #[test]
    fn uncompleting_moves_completed_status_back_to_in_progress() {
        let mut t = task();
        let now = Utc::now();
        t.apply_completed(true, now);
        assert_eq!(t.status, "Completed");
        t.apply_completed(false, now);
        assert_eq!(t.status, "In Progress");
        assert!(t.is_participant(1));
        assert!(t.is_participant(2));
        assert!(!t.is_participant(3));
    }
}
