//! # Fallback Executor
//!
//! Runs a caller's primary operation or, when the service's health and policy
//! say so, a priority-ordered chain of fallbacks. The first fallback that
//! produces a value (from cache or by running) wins.

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cmp::Reverse;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::metrics::DegradationMetrics;
use super::policy::{should_fallback, DegradationConfig, DegradationStrategy};
use crate::cache::{best_effort, ResultCache};
use crate::config::ExecutorConfig;
use crate::health::registry::{ServiceEntry, ServiceRegistry};
use crate::health::types::ServiceStatus;

/// Suggested client retry delay once every fallback has failed
pub const FALLBACK_EXHAUSTED_RETRY_AFTER: Duration = Duration::from_secs(30);

/// The only errors `execute_with_degradation` hands back to a caller
#[derive(Debug, Error)]
pub enum ExecutionError<E> {
    /// The primary operation failed and no fallback was attempted
    #[error("Operation failed: {0}")]
    Operation(E),

    /// Every fallback failed
    #[error("All fallback operations failed for service {service}")]
    FallbackExhausted {
        service: String,
        attempts: usize,
        last_error: Option<String>,
    },
}

impl<E> ExecutionError<E> {
    /// Retry hint for an HTTP layer (`Retry-After`)
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Operation(_) => None,
            Self::FallbackExhausted { .. } => Some(FALLBACK_EXHAUSTED_RETRY_AFTER),
        }
    }

    /// Map to a 503-class response without exposing health internals
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, Self::FallbackExhausted { .. })
    }

    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(e) => Some(e),
            Self::FallbackExhausted { .. } => None,
        }
    }

    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            Self::FallbackExhausted { .. } => None,
        }
    }
}

type OperationFn<T, E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, E>> + Send>;

/// One alternative way to produce a result, consumed by a single execution
pub struct FallbackOperation<T, E> {
    run: OperationFn<T, E>,
    cache_key: Option<String>,
    cache_duration: Option<Duration>,
    priority: i32,
    timeout: Option<Duration>,
}

impl<T, E> FallbackOperation<T, E> {
    pub fn new<F, Fut>(run: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            run: Box::new(move || Box::pin(run())),
            cache_key: None,
            cache_duration: None,
            priority: 0,
            timeout: None,
        }
    }

    /// Look results up under `key`; written back only if a duration is also set
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = Some(duration);
        self
    }

    /// Shorthand for key plus duration
    pub fn cached(self, key: impl Into<String>, duration: Duration) -> Self {
        self.with_cache_key(key).with_cache_duration(duration)
    }

    /// Higher runs first
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn cache_key(&self) -> Option<&str> {
        self.cache_key.as_deref()
    }
}

impl<T, E> fmt::Debug for FallbackOperation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackOperation")
            .field("cache_key", &self.cache_key)
            .field("cache_duration", &self.cache_duration)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Routes calls between primary operations and fallback chains
#[derive(Debug)]
pub struct FallbackExecutor {
    registry: Arc<ServiceRegistry>,
    cache: Arc<ResultCache>,
    metrics: Arc<DegradationMetrics>,
    config: ExecutorConfig,
}

impl FallbackExecutor {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        cache: Arc<ResultCache>,
        metrics: Arc<DegradationMetrics>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            metrics,
            config,
        }
    }

    pub async fn execute<T, E, P, Fut>(
        &self,
        service: &str,
        primary: P,
        fallbacks: Vec<FallbackOperation<T, E>>,
    ) -> Result<T, ExecutionError<E>>
    where
        P: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + DeserializeOwned,
        E: fmt::Display,
    {
        let Some(entry) = self.registry.get(service) else {
            warn!(
                service = service,
                "Service not registered for degradation, running primary directly"
            );
            return primary().await.map_err(ExecutionError::Operation);
        };

        let (config, mut health) = entry.snapshot();
        if entry.breaker_open() && health.status == ServiceStatus::Healthy {
            // An open breaker is a stronger signal than the last probe
            health.status = ServiceStatus::Unavailable;
        }

        if health.is_healthy() {
            return self.run_primary(&entry, primary).await;
        }

        if !should_fallback(&config, &health) {
            debug!(
                service = service,
                status = %health.status,
                strategy = %config.strategy,
                "Policy declined fallback, running primary"
            );
            return self.run_primary(&entry, primary).await;
        }

        if fallbacks.is_empty() {
            debug!(
                service = service,
                status = %health.status,
                "No fallbacks supplied, running primary"
            );
            return self.run_primary(&entry, primary).await;
        }

        info!(
            service = service,
            status = %health.status,
            strategy = %config.strategy,
            fallbacks = fallbacks.len(),
            "🔄 Routing call through fallbacks"
        );
        self.run_fallbacks(service, &config, fallbacks).await
    }

    async fn run_primary<T, E, P, Fut>(
        &self,
        entry: &ServiceEntry,
        primary: P,
    ) -> Result<T, ExecutionError<E>>
    where
        P: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let result = primary().await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => entry.record_live_success(latency_ms),
            Err(_) => {
                entry.record_live_failure(latency_ms, &self.metrics);
                debug!(
                    service = entry.name(),
                    latency_ms = latency_ms,
                    "Primary operation failed"
                );
            }
        }

        result.map_err(ExecutionError::Operation)
    }

    async fn run_fallbacks<T, E>(
        &self,
        service: &str,
        config: &DegradationConfig,
        mut fallbacks: Vec<FallbackOperation<T, E>>,
    ) -> Result<T, ExecutionError<E>>
    where
        T: Serialize + DeserializeOwned,
        E: fmt::Display,
    {
        // Stable: equal priorities keep caller order
        fallbacks.sort_by_key(|op| Reverse(op.priority));
        let attempts = fallbacks.len();
        let mut last_error = None;

        for (index, operation) in fallbacks.into_iter().enumerate() {
            if let Some(key) = operation.cache_key.as_deref() {
                if let Some(value) = self.cache.get::<T>(key).await {
                    self.metrics.record_successful_fallback();
                    info!(
                        service = service,
                        cache_key = key,
                        priority = operation.priority,
                        "✅ Fallback served from cache"
                    );
                    return Ok(value);
                }
            }

            if config.strategy == DegradationStrategy::RetryWithBackoff && index > 0 {
                let delay = self.backoff_delay(config, index as u32);
                debug!(
                    service = service,
                    attempt = index + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before next fallback"
                );
                tokio::time::sleep(delay).await;
            }

            let timeout = operation
                .timeout
                .unwrap_or_else(|| self.config.fallback_timeout());

            match tokio::time::timeout(timeout, (operation.run)()).await {
                Ok(Ok(value)) => {
                    if let (Some(key), Some(duration)) =
                        (operation.cache_key.as_deref(), operation.cache_duration)
                    {
                        let ttl = duration.min(config.cache_timeout());
                        best_effort("set", key, self.cache.put(key, &value, ttl)).await;
                    }
                    self.metrics.record_successful_fallback();
                    info!(
                        service = service,
                        attempt = index + 1,
                        priority = operation.priority,
                        "✅ Fallback operation succeeded"
                    );
                    return Ok(value);
                }
                Ok(Err(e)) => {
                    warn!(
                        service = service,
                        attempt = index + 1,
                        priority = operation.priority,
                        error = %e,
                        "Fallback operation failed"
                    );
                    last_error = Some(e.to_string());
                }
                Err(_) => {
                    warn!(
                        service = service,
                        attempt = index + 1,
                        priority = operation.priority,
                        timeout_ms = timeout.as_millis() as u64,
                        "Fallback operation timed out"
                    );
                    last_error = Some(format!("timed out after {}ms", timeout.as_millis()));
                }
            }
        }

        self.metrics.record_failed_operation();
        error!(
            service = service,
            attempts = attempts,
            last_error = last_error.as_deref().unwrap_or("none"),
            "❌ All fallback operations failed"
        );

        Err(ExecutionError::FallbackExhausted {
            service: service.to_string(),
            attempts,
            last_error,
        })
    }

    /// Delay before the `retry`-th retry: `retry_delay × 2^(retry − 1)`, capped
    fn backoff_delay(&self, config: &DegradationConfig, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(20);
        let millis = config.retry_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(millis).min(self.config.max_backoff())
    }
}
