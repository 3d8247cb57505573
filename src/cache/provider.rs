//! Cache provider selected from configuration
//!
//! Uses enum dispatch over the concrete backends. Startup never fails because of
//! the cache: an unreachable or unavailable backend degrades to NoOp.

use super::errors::CacheResult;
use super::providers::{MokaCacheService, NoOpCacheService};
use super::traits::CacheService;
use crate::config::{CacheBackendKind, CacheConfig};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(feature = "cache-redis")]
use super::providers::RedisCacheService;

#[derive(Debug, Clone)]
enum CacheBackend {
    /// Redis cache provider (boxed to reduce enum size)
    #[cfg(feature = "cache-redis")]
    Redis(Box<RedisCacheService>),

    Moka(Box<MokaCacheService>),

    /// No-op cache provider (always miss, always succeed)
    NoOp(NoOpCacheService),
}

/// External cache tier built from `[cache]` configuration
#[derive(Debug, Clone)]
pub struct CacheProvider {
    backend: CacheBackend,
}

impl CacheProvider {
    /// Create a provider from configuration, falling back to NoOp on any failure
    pub async fn from_config_graceful(config: &CacheConfig) -> Self {
        let backend = match config.backend {
            CacheBackendKind::None => {
                info!("External cache disabled by configuration");
                CacheBackend::NoOp(NoOpCacheService::new())
            }
            CacheBackendKind::Moka => {
                let service = MokaCacheService::new(
                    config.local_max_capacity,
                    config.local_freshness(),
                );
                info!(
                    backend = "moka",
                    max_capacity = config.local_max_capacity,
                    "In-memory cache provider initialized successfully"
                );
                CacheBackend::Moka(Box::new(service))
            }
            CacheBackendKind::Redis => Self::create_redis_backend(config).await,
        };

        Self { backend }
    }

    #[cfg(feature = "cache-redis")]
    async fn create_redis_backend(config: &CacheConfig) -> CacheBackend {
        let Some(url) = config.redis_url.as_deref() else {
            warn!("Redis cache enabled but no redis_url configured, falling back to NoOp");
            return CacheBackend::NoOp(NoOpCacheService::new());
        };

        match RedisCacheService::connect(url).await {
            Ok(service) => {
                info!(
                    backend = "redis",
                    "Distributed cache provider initialized successfully"
                );
                CacheBackend::Redis(Box::new(service))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to connect to Redis, falling back to NoOp cache (graceful degradation)"
                );
                CacheBackend::NoOp(NoOpCacheService::new())
            }
        }
    }

    #[cfg(not(feature = "cache-redis"))]
    async fn create_redis_backend(_config: &CacheConfig) -> CacheBackend {
        warn!("Redis cache backend requested but 'cache-redis' feature not enabled, using NoOp");
        CacheBackend::NoOp(NoOpCacheService::new())
    }

    pub fn noop() -> Self {
        Self {
            backend: CacheBackend::NoOp(NoOpCacheService::new()),
        }
    }

    /// False only for NoOp
    pub fn is_enabled(&self) -> bool {
        !matches!(self.backend, CacheBackend::NoOp(_))
    }
}

#[async_trait]
impl CacheService for CacheProvider {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        match &self.backend {
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis(s) => s.get(key).await,
            CacheBackend::Moka(s) => s.get(key).await,
            CacheBackend::NoOp(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        match &self.backend {
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis(s) => s.set(key, value, ttl).await,
            CacheBackend::Moka(s) => s.set(key, value, ttl).await,
            CacheBackend::NoOp(s) => s.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        match &self.backend {
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis(s) => s.delete(key).await,
            CacheBackend::Moka(s) => s.delete(key).await,
            CacheBackend::NoOp(s) => s.delete(key).await,
        }
    }

    async fn health_check(&self) -> CacheResult<bool> {
        match &self.backend {
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis(s) => s.health_check().await,
            CacheBackend::Moka(s) => s.health_check().await,
            CacheBackend::NoOp(s) => s.health_check().await,
        }
    }

    fn provider_name(&self) -> &'static str {
        match &self.backend {
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis(s) => s.provider_name(),
            CacheBackend::Moka(s) => s.provider_name(),
            CacheBackend::NoOp(s) => s.provider_name(),
        }
    }

    fn is_distributed(&self) -> bool {
        match &self.backend {
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis(s) => s.is_distributed(),
            CacheBackend::Moka(s) => s.is_distributed(),
            CacheBackend::NoOp(s) => s.is_distributed(),
        }
    }
}
