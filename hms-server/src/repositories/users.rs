//! Accounts, RBAC tables, token blacklist and the initial seed

use crate::auth::permissions::{role_permissions, BUILT_IN_ROLES, PERMISSIONS, SAMPLE_ORDERABLE_ITEMS, SYSTEM_ADMIN_ROLE};
use crate::core::HmsResult;
use crate::database::PostgresManager;
use crate::models::user::PHARMACY_GROUP;
use crate::models::{Role, SeedSummary, User};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const USER_COLUMNS: &str = r#"
    id, username, email, hashed_password, full_name, is_active, mfa_enabled,
    password_reset_token, password_reset_expires, created_at, updated_at
"#;

impl PostgresManager {
    pub async fn find_user_by_id(&self, user_id: i32) -> HmsResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_username(&self, username: &str) -> HmsResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> HmsResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn user_exists(&self, user_id: i32) -> HmsResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Insert a new account. A duplicate username or email surfaces as a unique violation.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        hashed_password: &str,
        full_name: &str,
    ) -> HmsResult<User> {
        let query = format!(
            r#"
            INSERT INTO users (username, email, hashed_password, full_name)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(username)
            .bind(email)
            .bind(hashed_password)
            .bind(full_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn user_role_names(&self, user_id: i32) -> HmsResult<Vec<String>> {
        let query = r#"
            SELECT r.name
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
        "#;
        let names = sqlx::query_scalar(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    /// Union of the permissions granted by every role the user holds
    pub async fn user_permission_names(&self, user_id: i32) -> HmsResult<Vec<String>> {
        let query = r#"
            SELECT DISTINCT p.name
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            JOIN user_roles ur ON ur.role_id = rp.role_id
            WHERE ur.user_id = $1
            ORDER BY p.name
        "#;
        let names = sqlx::query_scalar(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    pub async fn set_password_reset_token(
        &self,
        user_id: i32,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> HmsResult<()> {
        let query = r#"
            UPDATE users
            SET password_reset_token = $2, password_reset_expires = $3, updated_at = NOW()
            WHERE id = $1
        "#;
        sqlx::query(query)
            .bind(user_id)
            .bind(token)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn find_user_by_reset_token(&self, token: &str) -> HmsResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE password_reset_token = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Store a new password hash and clear any pending reset token
    pub async fn reset_password(&self, user_id: i32, hashed_password: &str) -> HmsResult<()> {
        let query = r#"
            UPDATE users
            SET hashed_password = $2,
                password_reset_token = NULL,
                password_reset_expires = NULL,
                updated_at = NOW()
            WHERE id = $1
        "#;
        sqlx::query(query)
            .bind(user_id)
            .bind(hashed_password)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn is_token_blacklisted(&self, jti: &str) -> HmsResult<bool> {
        let revoked: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM token_blacklist WHERE jti = $1)")
                .bind(jti)
                .fetch_one(&self.pool)
                .await?;
        Ok(revoked)
    }

    /// Revoke a token id. Returns false when it was already revoked.
    pub async fn blacklist_token(&self, jti: &str, expires_at: DateTime<Utc>) -> HmsResult<bool> {
        let query = r#"
            INSERT INTO token_blacklist (jti, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (jti) DO NOTHING
        "#;
        let result = sqlx::query(query)
            .bind(jti)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop blacklist rows whose tokens have expired anyway
    pub async fn purge_expired_blacklist(&self) -> HmsResult<u64> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_role_by_name(&self, name: &str) -> HmsResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    /// Grant a role. Pharmacists are also enrolled in the pharmacy group.
    pub async fn assign_role(&self, user_id: i32, role: &Role) -> HmsResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(role.id)
            .execute(&mut *tx)
            .await?;

        if role.name == "Pharmacist" {
            let query = r#"
                INSERT INTO user_group_members (user_id, group_id)
                SELECT $1, id FROM user_groups WHERE name = $2
                ON CONFLICT DO NOTHING
            "#;
            sqlx::query(query)
                .bind(user_id)
                .bind(PHARMACY_GROUP)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// True once any account holds the SystemAdmin role
    pub async fn system_admin_exists(&self) -> HmsResult<bool> {
        let query = r#"
            SELECT EXISTS(
                SELECT 1 FROM user_roles ur
                JOIN roles r ON r.id = ur.role_id
                WHERE r.name = $1
            )
        "#;
        let exists: bool = sqlx::query_scalar(query)
            .bind(SYSTEM_ADMIN_ROLE)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    pub async fn group_member_ids(&self, group_name: &str) -> HmsResult<Vec<i32>> {
        let query = r#"
            SELECT m.user_id
            FROM user_group_members m
            JOIN user_groups g ON g.id = m.group_id
            WHERE g.name = $1
            ORDER BY m.user_id
        "#;
        let ids = sqlx::query_scalar(query)
            .bind(group_name)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// Idempotently install the permission catalog, the built-in roles, the
    /// pharmacy group and (on an empty catalog) the sample orderable items.
    pub async fn seed_roles_and_permissions(&self) -> HmsResult<SeedSummary> {
        let mut summary = SeedSummary::default();
        let mut tx = self.pool.begin().await?;

        for &(name, description) in PERMISSIONS {
            let result = sqlx::query(
                "INSERT INTO permissions (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
            )
            .bind(name)
            .bind(description)
            .execute(&mut *tx)
            .await?;
            summary.permissions_created += result.rows_affected();
        }

        for role in BUILT_IN_ROLES {
            let result = sqlx::query(
                "INSERT INTO roles (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
            )
            .bind(role)
            .bind(format!("{} role", role))
            .execute(&mut *tx)
            .await?;
            summary.roles_created += result.rows_affected();

            let grants: Vec<String> = role_permissions(role).into_iter().map(String::from).collect();
            let query = r#"
                INSERT INTO role_permissions (role_id, permission_id)
                SELECT r.id, p.id
                FROM roles r, permissions p
                WHERE r.name = $1 AND p.name = ANY($2)
                ON CONFLICT DO NOTHING
            "#;
            let result = sqlx::query(query)
                .bind(role)
                .bind(&grants)
                .execute(&mut *tx)
                .await?;
            summary.grants_added += result.rows_affected();
        }

        let result = sqlx::query(
            "INSERT INTO user_groups (id, name, description) VALUES ($1, $2, $3) ON CONFLICT (name) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(PHARMACY_GROUP)
        .bind("Receives new medication order alerts")
        .execute(&mut *tx)
        .await?;
        summary.groups_created += result.rows_affected();

        let catalog_size: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orderable_items")
            .fetch_one(&mut *tx)
            .await?;
        if catalog_size == 0 {
            for item in SAMPLE_ORDERABLE_ITEMS {
                let (min_dose, max_dose, unit) = match item.dose_range {
                    Some((min, max, unit)) => (Some(min), Some(max), Some(unit)),
                    None => (None, None, None),
                };
                let query = r#"
                    INSERT INTO orderable_items (
                        id, item_type, name, generic_name, code, is_active,
                        min_dose, max_dose, default_dose_unit
                    ) VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7, $8)
                "#;
                sqlx::query(query)
                    .bind(Uuid::new_v4().to_string())
                    .bind(item.item_type)
                    .bind(item.name)
                    .bind(item.generic_name)
                    .bind(item.code)
                    .bind(min_dose)
                    .bind(max_dose)
                    .bind(unit)
                    .execute(&mut *tx)
                    .await?;
                summary.orderable_items_created += 1;
            }
        }

        tx.commit().await?;
        Ok(summary)
    }
}
