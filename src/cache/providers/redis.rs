//! Redis cache provider
//!
//! Uses `redis::aio::ConnectionManager` for async multiplexed connections.
//! Requires the `cache-redis` feature flag.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::CacheService;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Redis-backed cache service using ConnectionManager
#[derive(Clone)]
pub struct RedisCacheService {
    connection_manager: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheService")
            .field("connection_manager", &"ConnectionManager")
            .finish()
    }
}

impl RedisCacheService {
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            CacheError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let connection_manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| {
                CacheError::ConnectionError(format!("Failed to connect to Redis: {}", e))
            })?;

        debug!(url = %redact_url(url), "Redis cache service connected");

        Ok(Self { connection_manager })
    }
}

#[async_trait]
impl CacheService for RedisCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection_manager.clone();
        let result: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis GET failed: {}", e)))?;

        debug!(key = key, hit = result.is_some(), "Cache GET (redis)");
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        let ttl_millis = ttl.as_millis().max(1) as u64;

        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis SET failed: {}", e)))?;

        debug!(key = key, ttl_ms = ttl_millis, "Cache SET (redis)");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();

        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis DEL failed: {}", e)))?;

        debug!(key = key, "Cache DEL (redis)");
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.connection_manager.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis PING failed: {}", e)))?;

        Ok(pong == "PONG")
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }

    fn is_distributed(&self) -> bool {
        true
    }
}

/// Strip credentials from a connection URL before logging it
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
