//! Registry of monitored services shared by the scheduler and the executor.
//!
//! Each entry owns its tracker behind a `parking_lot::Mutex`. Locks are taken for
//! the duration of a single update and never held across `.await`.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use super::history::HealthHistory;
use super::probe::{CircuitBreaker, HealthProbe, ProbeOutcome};
use super::tracker::{ServiceHealthTracker, TransitionOutcome};
use super::types::{HealthCheckResult, ServiceHealth, ServiceStatus};
use crate::degradation::metrics::DegradationMetrics;
use crate::degradation::policy::DegradationConfig;

/// Registry entry for one service
pub struct ServiceEntry {
    name: String,
    tracker: Mutex<ServiceHealthTracker>,
    history: Mutex<HealthHistory>,
    probe: Option<Arc<dyn HealthProbe>>,
    breaker: Option<Arc<dyn CircuitBreaker>>,
}

impl std::fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("name", &self.name)
            .field("status", &self.tracker.lock().status())
            .field("has_probe", &self.probe.is_some())
            .field("has_breaker", &self.breaker.is_some())
            .finish()
    }
}

impl ServiceEntry {
    pub fn new(
        name: impl Into<String>,
        config: DegradationConfig,
        probe: Option<Arc<dyn HealthProbe>>,
        breaker: Option<Arc<dyn CircuitBreaker>>,
        history: HealthHistory,
    ) -> Self {
        let name = name.into();
        Self {
            tracker: Mutex::new(ServiceHealthTracker::new(name.clone(), config)),
            history: Mutex::new(history),
            name,
            probe,
            breaker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn probe(&self) -> Option<&Arc<dyn HealthProbe>> {
        self.probe.as_ref()
    }

    pub fn breaker_open(&self) -> bool {
        self.breaker.as_ref().is_some_and(|b| b.is_open())
    }

    pub fn config(&self) -> DegradationConfig {
        self.tracker.lock().config().clone()
    }

    pub fn health(&self) -> ServiceHealth {
        self.tracker.lock().health().clone()
    }

    pub fn status(&self) -> ServiceStatus {
        self.tracker.lock().status()
    }

    /// Config and health read under one lock
    pub fn snapshot(&self) -> (DegradationConfig, ServiceHealth) {
        let tracker = self.tracker.lock();
        (tracker.config().clone(), tracker.health().clone())
    }

    /// Feed a probe outcome through the state machine and into the metrics
    pub fn record_probe(
        &self,
        outcome: &ProbeOutcome,
        metrics: &DegradationMetrics,
    ) -> (TransitionOutcome, ServiceHealth) {
        let (transition, health) = {
            let mut tracker = self.tracker.lock();
            let transition = tracker.record_probe(outcome);
            (transition, tracker.health().clone())
        };

        if !outcome.healthy {
            metrics.record_service_failure(&self.name);
        }
        if let Some(record) = transition.degradation.clone() {
            metrics.record_degradation(record);
        }
        if let Some(recovered_at) = transition.recovered_at {
            metrics.complete_degradation(&self.name, recovered_at);
        }

        (transition, health)
    }

    pub fn record_live_success(&self, latency_ms: u64) {
        self.tracker.lock().record_live_success(latency_ms);
    }

    pub fn record_live_failure(&self, latency_ms: u64, metrics: &DegradationMetrics) {
        self.tracker.lock().record_live_failure(latency_ms);
        metrics.record_service_failure(&self.name);
    }

    pub fn force_status(&self, status: ServiceStatus, reason: Option<String>) {
        self.tracker.lock().force_status(status, reason);
    }

    pub fn push_history(&self, result: HealthCheckResult) {
        self.history.lock().push(result);
    }

    pub fn history(&self) -> Vec<HealthCheckResult> {
        self.history.lock().to_vec()
    }

    pub fn latest_check(&self) -> Option<HealthCheckResult> {
        self.history.lock().latest().cloned()
    }
}

/// Name → entry map
#[derive(Debug)]
pub struct ServiceRegistry {
    services: DashMap<String, Arc<ServiceEntry>>,
    history_retention: Duration,
    max_history_entries: usize,
}

impl ServiceRegistry {
    pub fn new(history_retention: Duration, max_history_entries: usize) -> Self {
        Self {
            services: DashMap::new(),
            history_retention,
            max_history_entries,
        }
    }

    /// Insert a new entry; returns `None` if the name is taken
    pub fn insert(
        &self,
        name: &str,
        config: DegradationConfig,
        probe: Option<Arc<dyn HealthProbe>>,
        breaker: Option<Arc<dyn CircuitBreaker>>,
    ) -> Option<Arc<ServiceEntry>> {
        match self.services.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let entry = Arc::new(ServiceEntry::new(
                    name,
                    config,
                    probe,
                    breaker,
                    HealthHistory::new(self.history_retention, self.max_history_entries),
                ));
                slot.insert(entry.clone());
                Some(entry)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ServiceEntry>> {
        self.services.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Sorted by name
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Sorted by name
    pub fn entries(&self) -> Vec<Arc<ServiceEntry>> {
        let mut entries: Vec<Arc<ServiceEntry>> =
            self.services.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        entries
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
