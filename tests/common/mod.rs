//! Shared test doubles for integration tests.
#![allow(dead_code)]

pub mod strategies;

use async_trait::async_trait;
use parking_lot::Mutex;
use resilience_engine::alerts::{AlertDispatcher, AlertError, AlertPayload};
use resilience_engine::cache::{CacheResult, CacheService};
use resilience_engine::config::EngineConfig;
use resilience_engine::health::{CircuitBreaker, HealthProbe, ProbeError, ProbeOutcome};
use resilience_engine::ResilienceEngine;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Probe whose health can be flipped from the test body
#[derive(Debug)]
pub struct ToggleProbe {
    healthy: AtomicBool,
    calls: AtomicUsize,
    latency_ms: u64,
    delay: Option<Duration>,
}

impl ToggleProbe {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::with(true, 5, None))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::with(false, 5, None))
    }

    /// Sleeps `delay` before answering (for timeout tests)
    pub fn stalled(delay: Duration) -> Arc<Self> {
        Arc::new(Self::with(true, 5, Some(delay)))
    }

    pub fn slow(latency_ms: u64) -> Arc<Self> {
        Arc::new(Self::with(true, latency_ms, None))
    }

    fn with(healthy: bool, latency_ms: u64, delay: Option<Duration>) -> Self {
        Self {
            healthy: AtomicBool::new(healthy),
            calls: AtomicUsize::new(0),
            latency_ms,
            delay,
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ToggleProbe {
    async fn check_health(&self, _timeout: Duration) -> Result<ProbeOutcome, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.healthy.load(Ordering::SeqCst) {
            Ok(ProbeOutcome::healthy(self.latency_ms))
        } else {
            Err(ProbeError::Failed("connection refused".to_string()))
        }
    }
}

/// Circuit breaker with a settable state
#[derive(Debug, Default)]
pub struct ToggleBreaker {
    open: AtomicBool,
}

impl ToggleBreaker {
    pub fn open() -> Arc<Self> {
        let breaker = Self::default();
        breaker.set_open(true);
        Arc::new(breaker)
    }

    pub fn closed() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }
}

impl CircuitBreaker for ToggleBreaker {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Dispatcher that keeps every alert it receives
#[derive(Debug, Default)]
pub struct RecordingAlertDispatcher {
    alerts: Mutex<Vec<AlertPayload>>,
    fail: AtomicBool,
}

impl RecordingAlertDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let dispatcher = Self::default();
        dispatcher.fail.store(true, Ordering::SeqCst);
        Arc::new(dispatcher)
    }

    pub fn alerts(&self) -> Vec<AlertPayload> {
        self.alerts.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.alerts.lock().len()
    }
}

#[async_trait]
impl AlertDispatcher for RecordingAlertDispatcher {
    async fn notify(&self, payload: AlertPayload) -> Result<(), AlertError> {
        self.alerts.lock().push(payload);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AlertError::DeliveryFailed("webhook returned 500".to_string()));
        }
        Ok(())
    }
}

/// External cache double that remembers the TTL of every write
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, Duration)>>,
    sets: AtomicUsize,
}

impl InMemoryCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).map(|(value, _)| value.clone())
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries.lock().get(key).map(|(_, ttl)| *ttl)
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), Duration::from_secs(3600)));
    }
}

#[async_trait]
impl CacheService for InMemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "in-memory-test"
    }
}

/// Engine config for tests: no host sampling, no alert cooldown
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.monitor.collect_system_metrics = false;
    config.monitor.alert_cooldown_ms = 0;
    config
}

pub struct TestEngine {
    pub engine: Arc<ResilienceEngine>,
    pub cache: Arc<InMemoryCache>,
    pub alerts: Arc<RecordingAlertDispatcher>,
}

pub fn test_engine() -> TestEngine {
    test_engine_with(test_config())
}

pub fn test_engine_with(config: EngineConfig) -> TestEngine {
    let cache = InMemoryCache::new();
    let alerts = RecordingAlertDispatcher::new();
    let engine = ResilienceEngine::builder()
        .config(config)
        .external_cache(cache.clone())
        .alert_dispatcher(alerts.clone())
        .build()
        .expect("test engine config is valid");

    TestEngine {
        engine: Arc::new(engine),
        cache,
        alerts,
    }
}

/// Let spawned tasks (alert dispatch) run to completion
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
