//! No-op cache provider
//!
//! Always returns None/success. Used when no external store is configured or
//! when the configured backend is unreachable at startup.

use crate::cache::errors::CacheResult;
use crate::cache::traits::CacheService;
use async_trait::async_trait;
use std::time::Duration;

/// No-op cache service that never caches anything
#[derive(Debug, Clone, Default)]
pub struct NoOpCacheService;

impl NoOpCacheService {
    /// Create a new no-op cache service
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CacheService for NoOpCacheService {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }
}
