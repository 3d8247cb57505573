//! # Health Probes
//!
//! The narrow interfaces through which the engine samples a dependency: a
//! [`HealthProbe`] per monitored service and an optional [`CircuitBreaker`] whose
//! open state counts as a failed probe.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::cache::CacheService;

/// Why a probe produced no usable result
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    #[error("Health probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("Health probe failed: {0}")]
    Failed(String),
    #[error("Circuit breaker is open for {0}")]
    CircuitOpen(String),
}

/// Result of a single health probe
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub healthy: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn healthy(latency_ms: u64) -> Self {
        Self {
            healthy: true,
            latency_ms,
            error: None,
        }
    }

    pub fn unhealthy(latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            latency_ms,
            error: Some(error.into()),
        }
    }

    /// Convert a probe error into a failed outcome
    pub fn from_error(error: &ProbeError, latency_ms: u64) -> Self {
        Self::unhealthy(latency_ms, error.to_string())
    }
}

/// Per-service health check supplied by the embedding application
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Sample the dependency; the scheduler enforces `timeout` independently
    async fn check_health(&self, timeout: Duration) -> Result<ProbeOutcome, ProbeError>;
}

/// External circuit breaker consulted as an additional failure signal
pub trait CircuitBreaker: Send + Sync {
    fn is_open(&self) -> bool;
}

type ProbeFn = dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync;

/// Probe built from an async closure; latency is measured around the call
pub struct FnProbe {
    check: Box<ProbeFn>,
}

impl FnProbe {
    pub fn new<F, Fut>(check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), String>> + Send + 'static,
    {
        Self {
            check: Box::new(move || Box::pin(check())),
        }
    }
}

impl std::fmt::Debug for FnProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProbe").finish_non_exhaustive()
    }
}

#[async_trait]
impl HealthProbe for FnProbe {
    async fn check_health(&self, _timeout: Duration) -> Result<ProbeOutcome, ProbeError> {
        let started = Instant::now();
        let result = (self.check)().await;
        let latency_ms = started.elapsed().as_millis() as u64;

        Ok(match result {
            Ok(()) => ProbeOutcome::healthy(latency_ms),
            Err(error) => ProbeOutcome::unhealthy(latency_ms, error),
        })
    }
}

/// Probe that reports the health of a [`CacheService`] backend
#[derive(Debug, Clone)]
pub struct CacheHealthProbe {
    cache: Arc<dyn CacheService>,
}

impl CacheHealthProbe {
    pub fn new(cache: Arc<dyn CacheService>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl HealthProbe for CacheHealthProbe {
    async fn check_health(&self, _timeout: Duration) -> Result<ProbeOutcome, ProbeError> {
        let started = Instant::now();
        let result = self.cache.health_check().await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(true) => Ok(ProbeOutcome::healthy(latency_ms)),
            Ok(false) => Ok(ProbeOutcome::unhealthy(
                latency_ms,
                format!("{} reported unhealthy", self.cache.provider_name()),
            )),
            Err(e) => Err(ProbeError::Failed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NoOpCacheService;

    #[tokio::test]
    async fn test_fn_probe_reports_success_and_failure() {
        let ok = FnProbe::new(|| async { Ok(()) });
        let outcome = ok.check_health(Duration::from_secs(1)).await.unwrap();
        assert!(outcome.healthy);
        assert!(outcome.error.is_none());

        let failing = FnProbe::new(|| async { Err("connection refused".to_string()) });
        let outcome = failing.check_health(Duration::from_secs(1)).await.unwrap();
        assert!(!outcome.healthy);
        assert_eq!(outcome.error.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn test_cache_health_probe() {
        let probe = CacheHealthProbe::new(Arc::new(NoOpCacheService::new()));
        let outcome = probe.check_health(Duration::from_secs(1)).await.unwrap();
        assert!(outcome.healthy);
    }

    #[test]
    fn test_outcome_from_error() {
        let outcome = ProbeOutcome::from_error(&ProbeError::Timeout(Duration::from_secs(5)), 5_000);
        assert!(!outcome.healthy);
        assert_eq!(outcome.latency_ms, 5_000);
        assert!(outcome.error.unwrap().contains("timed out"));
    }
}
