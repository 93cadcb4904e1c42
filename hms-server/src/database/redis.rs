//! Redis cache manager and notification publisher

#![allow(dependency_on_unit_never_type_fallback)]

use super::DatabaseOperations;
use crate::config::RedisConfig;
use crate::core::{HmsResult, NotificationSink};
use anyhow::Result;
use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use serde_json::Value;

/// Cache key for one page of the orderable-items catalog
pub fn catalog_cache_key(query: &str, item_type: &str, page: i64, per_page: i64) -> String {
    format!(
        "catalog:{}:{}:{}:{}",
        query.to_lowercase(),
        item_type.to_lowercase(),
        page,
        per_page
    )
}

pub const CATALOG_CACHE_PATTERN: &str = "catalog:*";

pub fn notification_channel(user_id: i32) -> String {
    format!("notifications:{}", user_id)
}

pub struct RedisManager {
    pub(crate) pool: Pool,
    pub catalog_ttl_secs: u64,
}

impl RedisManager {
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let cfg = Config::from_url(config.url.as_str());
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;

        Ok(Self {
            pool,
            catalog_ttl_secs: config.catalog_cache_ttl_secs,
        })
    }

    /// Generic method to get JSON data from Redis
    pub async fn get_json<T>(&self, key: &str) -> HmsResult<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut conn = self.pool.get().await?;
        let cached: Option<String> = conn.get(key).await?;

        match cached {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Generic method to set JSON data in Redis with TTL
    pub async fn set_json<T>(&self, key: &str, value: &T, ttl_secs: u64) -> HmsResult<()>
    where
        T: serde::Serialize,
    {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(value)?;
        conn.set_ex(key, json, ttl_secs).await?;
        Ok(())
    }

    /// Drop every cached catalog page
    pub async fn invalidate_catalog(&self) -> HmsResult<u64> {
        let mut conn = self.pool.get().await?;
        let keys: Vec<String> = conn.keys(CATALOG_CACHE_PATTERN).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: u64 = conn.del(&keys).await?;
        Ok(removed)
    }

    /// Publish a message on a channel, returning the number of subscribers reached
    pub async fn publish(&self, channel: &str, message: &str) -> HmsResult<i64> {
        let mut conn = self.pool.get().await?;
        let receivers: i64 = conn.publish(channel, message).await?;
        Ok(receivers)
    }
}

#[async_trait]
impl DatabaseOperations for RedisManager {
    async fn health_check(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for RedisManager {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn deliver(&self, recipient_user_id: i32, payload: &Value) -> HmsResult<()> {
        let channel = notification_channel(recipient_user_id);
        self.publish(&channel, &payload.to_string()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_keys_are_case_insensitive() {
        assert_eq!(
            catalog_cache_key("Aspirin", "Medication", 1, 50),
            catalog_cache_key("aspirin", "medication", 1, 50)
        );
        assert!(catalog_cache_key("", "", 2, 10).starts_with("catalog:"));
    }

    #[test]
    fn channels_are_per_user() {
        assert_eq!(notification_channel(42), "notifications:42");
    }
}
