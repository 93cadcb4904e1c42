//! Centralized error types for the HMS server

use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum HmsError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Row not found")]
    RowNotFound,

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

/// Result type alias for service operations
pub type HmsResult<T> = Result<T, HmsError>;

impl HmsError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        HmsError::NotFound {
            entity: entity.into(),
        }
    }

    /// True when the underlying database rejected a duplicate key
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, HmsError::Storage(StorageError::UniqueViolation(_)))
    }
}

/// Helper to convert sqlx errors
impl From<sqlx::Error> for HmsError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => HmsError::Storage(StorageError::RowNotFound),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                HmsError::Storage(StorageError::UniqueViolation(db.message().to_string()))
            }
            other => HmsError::Storage(StorageError::Database(other.to_string())),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for HmsError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        HmsError::Storage(StorageError::MigrationFailed(err.to_string()))
    }
}

/// Helper to convert redis errors
impl From<redis::RedisError> for HmsError {
    fn from(err: redis::RedisError) -> Self {
        HmsError::Storage(StorageError::Cache(err.to_string()))
    }
}

impl From<deadpool_redis::PoolError> for HmsError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        HmsError::Storage(StorageError::Cache(err.to_string()))
    }
}

/// Hashing failures are server faults, never credential rejections
impl From<argon2::password_hash::Error> for HmsError {
    fn from(err: argon2::password_hash::Error) -> Self {
        HmsError::Other(anyhow::anyhow!("password hashing failed: {}", err))
    }
}

impl From<serde_json::Error> for HmsError {
    fn from(err: serde_json::Error) -> Self {
        HmsError::Serialization(err.to_string())
    }
}
