//! # Fallback Result Cache
//!
//! Two tiers in front of fallback operations:
//!
//! ```text
//!   lookup ──▶ in-process (moka, ≤ local_freshness) ──miss──▶ external CacheService
//!                                                              key = "fallback:<cacheKey>"
//! ```
//!
//! Every external call is bounded by `operation_timeout`. Lookups never fail: a
//! timeout, backend error or undecodable value is logged and treated as a miss.
//! Writes return their error so the caller can route it through [`best_effort`].

use super::errors::{CacheError, CacheResult};
use super::traits::CacheService;
use crate::config::CacheConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Key prefix for fallback results in the external store
pub const FALLBACK_KEY_PREFIX: &str = "fallback:";

pub fn fallback_key(cache_key: &str) -> String {
    format!("{FALLBACK_KEY_PREFIX}{cache_key}")
}

#[derive(Debug, Clone)]
struct LocalEntry {
    json: Arc<str>,
    expires_at: Instant,
}

/// Cache of serialized fallback results
pub struct ResultCache {
    local: moka::future::Cache<String, LocalEntry>,
    external: Arc<dyn CacheService>,
    local_freshness: Duration,
    operation_timeout: Duration,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("local_entries", &self.local.entry_count())
            .field("external", &self.external.provider_name())
            .field("local_freshness", &self.local_freshness)
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

impl ResultCache {
    pub fn new(external: Arc<dyn CacheService>, config: &CacheConfig) -> Self {
        let local_freshness = config.local_freshness();
        let local = moka::future::Cache::builder()
            .max_capacity(config.local_max_capacity)
            .time_to_live(local_freshness)
            .build();

        Self {
            local,
            external,
            local_freshness,
            operation_timeout: config.operation_timeout(),
        }
    }

    pub fn external(&self) -> &Arc<dyn CacheService> {
        &self.external
    }

    /// Look a result up in the local tier, then the external tier
    pub async fn get<T: DeserializeOwned>(&self, cache_key: &str) -> Option<T> {
        if let Some(entry) = self.local.get(cache_key).await {
            if entry.expires_at > Instant::now() {
                match serde_json::from_str(&entry.json) {
                    Ok(value) => {
                        debug!(cache_key = cache_key, "Fallback cache HIT (local)");
                        return Some(value);
                    }
                    Err(e) => {
                        warn!(cache_key = cache_key, error = %e, "Discarding undecodable local cache entry");
                    }
                }
            }
            self.local.invalidate(cache_key).await;
        }

        let key = fallback_key(cache_key);
        let json = match tokio::time::timeout(self.operation_timeout, self.external.get(&key)).await
        {
            Ok(Ok(Some(json))) => json,
            Ok(Ok(None)) => {
                debug!(cache_key = cache_key, "Fallback cache MISS");
                return None;
            }
            Ok(Err(e)) => {
                warn!(cache_key = cache_key, error = %e, "External cache lookup failed, treating as miss");
                return None;
            }
            Err(_) => {
                warn!(
                    cache_key = cache_key,
                    timeout_ms = self.operation_timeout.as_millis() as u64,
                    "External cache lookup timed out, treating as miss"
                );
                return None;
            }
        };

        match serde_json::from_str(&json) {
            Ok(value) => {
                debug!(cache_key = cache_key, provider = self.external.provider_name(), "Fallback cache HIT (external)");
                self.insert_local(cache_key, Arc::from(json), self.local_freshness)
                    .await;
                Some(value)
            }
            Err(e) => {
                warn!(cache_key = cache_key, error = %e, "Undecodable external cache entry, treating as miss");
                None
            }
        }
    }

    /// Store a result in both tiers
    ///
    /// The local tier keeps it for at most `min(ttl, local_freshness)`.
    pub async fn put<T: Serialize>(&self, cache_key: &str, value: &T, ttl: Duration) -> CacheResult<()> {
        let json = serde_json::to_string(value)?;
        self.insert_local(cache_key, Arc::from(json.as_str()), ttl)
            .await;

        let key = fallback_key(cache_key);
        match tokio::time::timeout(self.operation_timeout, self.external.set(&key, &json, ttl)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(format!(
                "SET {key} exceeded {}ms",
                self.operation_timeout.as_millis()
            ))),
        }
    }

    /// Remove a result from both tiers
    pub async fn invalidate(&self, cache_key: &str) -> CacheResult<()> {
        self.local.invalidate(cache_key).await;

        let key = fallback_key(cache_key);
        match tokio::time::timeout(self.operation_timeout, self.external.delete(&key)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(format!(
                "DEL {key} exceeded {}ms",
                self.operation_timeout.as_millis()
            ))),
        }
    }

    /// Publish an arbitrary JSON document to the external store (no local copy)
    pub async fn publish<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()> {
        let json = serde_json::to_string(value)?;
        match tokio::time::timeout(self.operation_timeout, self.external.set(key, &json, ttl)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(format!(
                "SET {key} exceeded {}ms",
                self.operation_timeout.as_millis()
            ))),
        }
    }

    /// Drop every local entry
    pub async fn clear_local(&self) {
        self.local.invalidate_all();
        self.local.run_pending_tasks().await;
    }

    pub fn local_entry_count(&self) -> u64 {
        self.local.entry_count()
    }

    async fn insert_local(&self, cache_key: &str, json: Arc<str>, ttl: Duration) {
        let ttl = ttl.min(self.local_freshness);
        if ttl.is_zero() {
            return;
        }
        self.local
            .insert(
                cache_key.to_string(),
                LocalEntry {
                    json,
                    expires_at: Instant::now() + ttl,
                },
            )
            .await;
    }
}

/// Await a cache write, logging and swallowing any failure
pub async fn best_effort<F>(operation: &'static str, key: &str, write: F)
where
    F: Future<Output = CacheResult<()>>,
{
    match write.await {
        Ok(()) => debug!(operation = operation, key = key, "Cache write completed"),
        Err(e) => warn!(
            operation = operation,
            key = key,
            error = %e,
            "Cache write failed (best effort, ignored)"
        ),
    }
}
