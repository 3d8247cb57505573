//! External cache store trait

use super::errors::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// Key/value store with per-entry TTL used as the external cache tier.
///
/// Backs two things: fallback results (`fallback:<cacheKey>`) and the published
/// system health summary (`health:system:summary`). Implementations handle their
/// own concurrency; the engine wraps every call in a short timeout.
#[async_trait]
pub trait CacheService: Send + Sync + std::fmt::Debug {
    /// Get a value from the cache by key
    ///
    /// Returns `Ok(Some(value))` on cache hit, `Ok(None)` on cache miss.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a value in the cache with a TTL
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Delete a specific key from the cache
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Check if the cache backend is healthy
    async fn health_check(&self) -> CacheResult<bool>;

    /// Get the name of the cache provider
    fn provider_name(&self) -> &'static str;

    /// Whether entries are visible to other processes
    fn is_distributed(&self) -> bool {
        false
    }
}
