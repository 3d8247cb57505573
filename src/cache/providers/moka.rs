//! In-process external tier backed by Moka
//!
//! Usable as the external tier for single-instance deployments or tests. Not
//! shared between processes, so a published health summary is only visible
//! in-process.

use crate::cache::errors::CacheResult;
use crate::cache::traits::CacheService;
use async_trait::async_trait;
use moka::Expiry;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredValue {
    json: String,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with
struct WriteTtl;

impl Expiry<String, StoredValue> for WriteTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Moka-backed [`CacheService`] honouring per-write TTLs
///
/// `max_ttl` caps every write, so no entry outlives the configured freshness.
#[derive(Clone)]
pub struct MokaCacheService {
    cache: moka::future::Cache<String, StoredValue>,
    max_ttl: Duration,
}

impl std::fmt::Debug for MokaCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheService")
            .field("max_capacity", &self.cache.policy().max_capacity())
            .field("entry_count", &self.cache.entry_count())
            .field("max_ttl", &self.max_ttl)
            .finish()
    }
}

impl MokaCacheService {
    pub fn new(max_capacity: u64, max_ttl: Duration) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(WriteTtl)
            .build();

        debug!(
            max_capacity = max_capacity,
            max_ttl_ms = max_ttl.as_millis() as u64,
            "Moka cache tier created"
        );

        Self { cache, max_ttl }
    }
}

#[async_trait]
impl CacheService for MokaCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let value = self.cache.get(key).await.map(|stored| stored.json);
        debug!(key = key, hit = value.is_some(), "moka GET");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let ttl = ttl.min(self.max_ttl);
        if ttl.is_zero() {
            self.cache.invalidate(key).await;
            return Ok(());
        }

        self.cache
            .insert(
                key.to_string(),
                StoredValue {
                    json: value.to_string(),
                    ttl,
                },
            )
            .await;
        debug!(key = key, ttl_ms = ttl.as_millis() as u64, "moka SET");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.cache.invalidate(key).await;
        debug!(key = key, "moka DEL");
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "moka"
    }
}
