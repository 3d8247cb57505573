//! # Resilience Engine
//!
//! The single handle an application holds (usually as `Arc<ResilienceEngine>`).
//! It owns the service registry, the fallback executor, the result cache, the
//! degradation metrics and the health monitor scheduler, and exposes the public
//! API over them.
//!
//! ```rust,no_run
//! use resilience_engine::{DegradationConfig, FallbackOperation, ResilienceEngine};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ResilienceEngine::builder().build()?;
//! engine.register("payments", DegradationConfig::for_external_api())?;
//!
//! let price: u32 = engine
//!     .execute_with_degradation(
//!         "payments",
//!         || async { Err::<u32, String>("gateway timeout".into()) },
//!         vec![FallbackOperation::new(|| async { Ok(42) })
//!             .cached("price:latest", Duration::from_secs(60))],
//!     )
//!     .await?;
//! # let _ = price;
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::alerts::{AlertDispatcher, LoggingAlertDispatcher};
use crate::cache::{CacheProvider, CacheService, NoOpCacheService, ResultCache};
use crate::config::EngineConfig;
use crate::degradation::executor::{ExecutionError, FallbackExecutor, FallbackOperation};
use crate::degradation::metrics::{DegradationMetrics, DegradationMetricsSnapshot};
use crate::degradation::policy::DegradationConfig;
use crate::error::{ResilienceError, ResilienceResult};
use crate::health::probe::{CircuitBreaker, HealthProbe, ProbeOutcome};
use crate::health::registry::{ServiceEntry, ServiceRegistry};
use crate::health::scheduler::HealthMonitorScheduler;
use crate::health::types::{HealthCheckResult, ServiceHealth, ServiceStatus, SystemHealthSummary};
use crate::logging::log_service_operation;

/// Everything needed to monitor one service
pub struct ServiceRegistration {
    pub name: String,
    pub config: DegradationConfig,
    pub probe: Option<Arc<dyn HealthProbe>>,
    pub circuit_breaker: Option<Arc<dyn CircuitBreaker>>,
}

impl ServiceRegistration {
    pub fn new(name: impl Into<String>, config: DegradationConfig) -> Self {
        Self {
            name: name.into(),
            config,
            probe: None,
            circuit_breaker: None,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_circuit_breaker(mut self, breaker: Arc<dyn CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }
}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("has_probe", &self.probe.is_some())
            .field("has_circuit_breaker", &self.circuit_breaker.is_some())
            .finish()
    }
}

/// Builder for [`ResilienceEngine`]
#[derive(Default)]
pub struct ResilienceEngineBuilder {
    config: Option<EngineConfig>,
    external_cache: Option<Arc<dyn CacheService>>,
    alert_dispatcher: Option<Arc<dyn AlertDispatcher>>,
}

impl ResilienceEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// External tier for fallback results and the published summary
    pub fn external_cache(mut self, cache: Arc<dyn CacheService>) -> Self {
        self.external_cache = Some(cache);
        self
    }

    pub fn alert_dispatcher(mut self, dispatcher: Arc<dyn AlertDispatcher>) -> Self {
        self.alert_dispatcher = Some(dispatcher);
        self
    }

    /// Validate the configuration and assemble the engine
    ///
    /// Services listed in the configuration are not registered here; see
    /// [`ResilienceEngine::from_config`].
    pub fn build(self) -> ResilienceResult<ResilienceEngine> {
        let config = self.config.unwrap_or_default();
        config.validate_all()?;

        let external = self
            .external_cache
            .unwrap_or_else(|| Arc::new(NoOpCacheService::new()));
        let dispatcher = self
            .alert_dispatcher
            .unwrap_or_else(|| Arc::new(LoggingAlertDispatcher));

        let registry = Arc::new(ServiceRegistry::new(
            config.monitor.history_retention(),
            config.monitor.max_history_entries,
        ));
        let metrics = Arc::new(DegradationMetrics::new(
            config.metrics.max_degradation_history,
        ));
        let cache = Arc::new(ResultCache::new(external, &config.cache));

        let executor = FallbackExecutor::new(
            registry.clone(),
            cache.clone(),
            metrics.clone(),
            config.executor.clone(),
        );
        let scheduler = HealthMonitorScheduler::new(
            registry.clone(),
            metrics.clone(),
            cache.clone(),
            dispatcher,
            config.monitor.clone(),
        );

        info!(
            external_cache = cache.external().provider_name(),
            probe_timeout_ms = config.monitor.probe_timeout_ms,
            fallback_timeout_ms = config.executor.fallback_timeout_ms,
            "✅ Resilience engine initialized"
        );

        Ok(ResilienceEngine {
            config,
            registry,
            metrics,
            cache,
            executor,
            scheduler,
        })
    }
}

/// Health tracking and degradation handle
#[derive(Debug)]
pub struct ResilienceEngine {
    config: EngineConfig,
    registry: Arc<ServiceRegistry>,
    metrics: Arc<DegradationMetrics>,
    cache: Arc<ResultCache>,
    executor: FallbackExecutor,
    scheduler: HealthMonitorScheduler,
}

impl ResilienceEngine {
    pub fn builder() -> ResilienceEngineBuilder {
        ResilienceEngineBuilder::default()
    }

    /// Build from configuration: external cache from `[cache]` (NoOp on failure)
    /// and every `[services.<name>]` table registered without a probe
    pub async fn from_config(config: EngineConfig) -> ResilienceResult<Arc<Self>> {
        config.validate_all()?;
        let external: Arc<dyn CacheService> =
            Arc::new(CacheProvider::from_config_graceful(&config.cache).await);

        let mut services: Vec<(String, DegradationConfig)> = config
            .services
            .iter()
            .map(|(name, service)| (name.clone(), service.clone()))
            .collect();
        services.sort_by(|a, b| a.0.cmp(&b.0));

        let engine = Self::builder()
            .config(config)
            .external_cache(external)
            .build()?;
        for (name, service) in services {
            engine.register(name, service)?;
        }

        Ok(Arc::new(engine))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a service without a probe; its health moves only through live
    /// calls, `record_probe_result` and `force_status`
    pub fn register(&self, name: impl Into<String>, config: DegradationConfig) -> ResilienceResult<()> {
        self.register_service(ServiceRegistration::new(name, config))
    }

    /// Register a service, starting its monitor task if it has a probe
    ///
    /// A probed registration must happen inside a Tokio runtime.
    pub fn register_service(&self, registration: ServiceRegistration) -> ResilienceResult<()> {
        if self.scheduler.is_shut_down() {
            return Err(ResilienceError::ShutDown);
        }

        let ServiceRegistration {
            name,
            config,
            probe,
            circuit_breaker,
        } = registration;

        if name.trim().is_empty() {
            return Err(ResilienceError::InvalidServiceConfig {
                service: name,
                reason: "service name must not be empty".to_string(),
            });
        }
        config
            .validate()
            .map_err(|e| ResilienceError::InvalidServiceConfig {
                service: name.clone(),
                reason: e.to_string(),
            })?;
        if probe.is_some() && tokio::runtime::Handle::try_current().is_err() {
            return Err(ResilienceError::ConfigurationError(format!(
                "service '{name}' has a health probe but no Tokio runtime is running"
            )));
        }

        let strategy = config.strategy;
        let has_probe = probe.is_some();
        let entry = self
            .registry
            .insert(&name, config, probe, circuit_breaker)
            .ok_or_else(|| ResilienceError::DuplicateService(name.clone()))?;

        if has_probe {
            self.scheduler.start_service(entry);
        }

        log_service_operation(
            "register",
            &name,
            ServiceStatus::Healthy.as_str(),
            Some(&format!("strategy={strategy} probe={has_probe}")),
        );
        Ok(())
    }

    /// False only for a registered service that is Unavailable or whose breaker
    /// is open; unknown services are assumed available
    pub fn is_available(&self, name: &str) -> bool {
        match self.registry.get(name) {
            Some(entry) => entry.status() != ServiceStatus::Unavailable && !entry.breaker_open(),
            None => true,
        }
    }

    pub fn get_health(&self, name: &str) -> Option<ServiceHealth> {
        self.registry.get(name).map(|entry| entry.health())
    }

    /// Run `primary`, or the fallbacks if the service is not healthy and its
    /// policy allows rerouting
    pub async fn execute_with_degradation<T, E, P, Fut>(
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
        self.executor.execute(service, primary, fallbacks).await
    }

    /// Latest summary recomputed by the scheduler
    pub fn get_system_health(&self) -> SystemHealthSummary {
        self.scheduler.summary()
    }

    /// Override a service's status and reset its counters
    pub fn force_status(
        &self,
        name: &str,
        status: ServiceStatus,
        reason: Option<String>,
    ) -> ResilienceResult<()> {
        let entry = self.entry(name)?;
        entry.force_status(status, reason.clone());
        log_service_operation("force_status", name, status.as_str(), reason.as_deref());
        Ok(())
    }

    /// Feed a probe result obtained outside the scheduler
    pub async fn record_probe_result(
        &self,
        name: &str,
        outcome: ProbeOutcome,
    ) -> ResilienceResult<HealthCheckResult> {
        let entry = self.entry(name)?;
        Ok(self.scheduler.observe(&entry, outcome).await)
    }

    /// Probe a service now, outside its schedule
    pub async fn check_now(&self, name: &str) -> ResilienceResult<HealthCheckResult> {
        let entry = self.entry(name)?;
        Ok(self.scheduler.check_now(&entry).await)
    }

    /// Oldest first
    pub fn health_history(&self, name: &str) -> ResilienceResult<Vec<HealthCheckResult>> {
        Ok(self.entry(name)?.history())
    }

    pub fn degradation_metrics(&self) -> DegradationMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Sorted by name
    pub fn registered_services(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Running monitor tasks
    pub fn active_monitors(&self) -> usize {
        self.scheduler.active_tasks()
    }

    /// Drop a cached fallback result from both tiers
    pub async fn invalidate_cached(&self, cache_key: &str) {
        crate::cache::best_effort("invalidate", cache_key, self.cache.invalidate(cache_key)).await;
    }

    /// Stop every monitor task and drop local cache entries; idempotent
    pub async fn shutdown(&self) {
        if self.scheduler.is_shut_down() {
            return;
        }
        self.scheduler.shutdown().await;
        self.cache.clear_local().await;
        log_service_operation("shutdown", "engine", "stopped", None);
    }

    pub fn is_shut_down(&self) -> bool {
        self.scheduler.is_shut_down()
    }

    fn entry(&self, name: &str) -> ResilienceResult<Arc<ServiceEntry>> {
        self.registry.get(name).ok_or_else(|| {
            warn!(service = name, "Unknown service");
            ResilienceError::UnknownService(name.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_validates_config() {
        let engine = ResilienceEngine::builder().build().unwrap();
        let err = engine
            .register(
                "db",
                DegradationConfig {
                    max_consecutive_failures: 0,
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, ResilienceError::InvalidServiceConfig { .. }));

        let err = engine
            .register(
                "archive",
                DegradationConfig {
                    health_check_interval_ms: u64::MAX,
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, ResilienceError::InvalidServiceConfig { ref service, .. } if service == "archive"));

        assert!(matches!(
            engine.register("  ", DegradationConfig::default()),
            Err(ResilienceError::InvalidServiceConfig { .. })
        ));
    }

    #[test]
    fn test_duplicate_registration() {
        let engine = ResilienceEngine::builder().build().unwrap();
        engine.register("db", DegradationConfig::default()).unwrap();
        assert_eq!(
            engine.register("db", DegradationConfig::default()),
            Err(ResilienceError::DuplicateService("db".to_string()))
        );
    }

    #[test]
    fn test_probe_registration_requires_runtime() {
        let engine = ResilienceEngine::builder().build().unwrap();
        let probe = Arc::new(crate::health::probe::FnProbe::new(|| async { Ok(()) }));
        let err = engine
            .register_service(ServiceRegistration::new("db", DegradationConfig::default()).with_probe(probe))
            .unwrap_err();
        assert!(matches!(err, ResilienceError::ConfigurationError(_)));
        assert!(engine.registered_services().is_empty());
    }

    #[test]
    fn test_unknown_service_queries() {
        let engine = ResilienceEngine::builder().build().unwrap();
        assert!(engine.is_available("nope"));
        assert!(engine.get_health("nope").is_none());
        assert_eq!(
            engine.force_status("nope", ServiceStatus::Unavailable, None),
            Err(ResilienceError::UnknownService("nope".to_string()))
        );
        assert!(engine.health_history("nope").is_err());
    }

    #[tokio::test]
    async fn test_shutdown_blocks_registration() {
        let engine = ResilienceEngine::builder().build().unwrap();
        engine.shutdown().await;
        engine.shutdown().await;
        assert!(engine.is_shut_down());
        assert_eq!(
            engine.register("db", DegradationConfig::default()),
            Err(ResilienceError::ShutDown)
        );
    }
}
