//! PostgreSQL system of record plus the Redis cache / fan-out tier

pub mod postgres;
pub mod redis;

use crate::config::{DatabaseConfig, RedisConfig};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use postgres::PostgresManager;
pub use self::redis::RedisManager;

/// Database connection manager
pub struct DatabaseManager {
    pub postgres: Arc<PostgresManager>,
    pub redis: Arc<RedisManager>,
}

impl DatabaseManager {
    /// Connect both pools. Fails fast when Postgres is unreachable.
    pub async fn new(database: &DatabaseConfig, redis: &RedisConfig) -> Result<Self> {
        let postgres = PostgresManager::new(database).await?;
        let redis = RedisManager::new(redis)?;

        Ok(Self {
            postgres: Arc::new(postgres),
            redis: Arc::new(redis),
        })
    }

    /// Pools that only connect on first use. Used by tests and `--dry-run`.
    pub fn new_lazy(database: &DatabaseConfig, redis: &RedisConfig) -> Result<Self> {
        let postgres = PostgresManager::connect_lazy(database)?;
        let redis = RedisManager::new(redis)?;

        Ok(Self {
            postgres: Arc::new(postgres),
            redis: Arc::new(redis),
        })
    }

    pub async fn health_check(&self) -> DatabaseHealth {
        let postgres_healthy = self.postgres.health_check().await.is_ok();
        let redis_healthy = self.redis.health_check().await.is_ok();

        DatabaseHealth {
            postgres: postgres_healthy,
            redis: redis_healthy,
            overall: postgres_healthy && redis_healthy,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub postgres: bool,
    pub redis: bool,
    pub overall: bool,
}

/// Common database operations trait
#[async_trait]
pub trait DatabaseOperations {
    async fn health_check(&self) -> Result<()>;
}
