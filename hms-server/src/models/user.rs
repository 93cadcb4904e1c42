//! Accounts, roles and groups

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row from `users`. The password hash and reset token never leave the server.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub mfa_enabled: bool,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The user shape every auth endpoint returns
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub mfa_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

impl UserProfile {
    /// Profile without role or permission lists (registration response)
    pub fn bare(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            is_active: user.is_active,
            mfa_enabled: user.mfa_enabled,
            created_at: user.created_at,
            updated_at: user.updated_at,
            roles: None,
            permissions: None,
        }
    }

    pub fn with_access(user: &User, roles: Vec<String>, permissions: Vec<String>) -> Self {
        Self {
            roles: Some(roles),
            permissions: Some(permissions),
            ..Self::bare(user)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

/// Group whose members receive new medication order alerts.
/// Assigning the Pharmacist role enrolls the user.
pub const PHARMACY_GROUP: &str = "Pharmacy";

/// Counters returned by the idempotent role/permission seed
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SeedSummary {
    pub permissions_created: u64,
    pub roles_created: u64,
    pub grants_added: u64,
    pub orderable_items_created: u64,
    pub groups_created: u64,
}
