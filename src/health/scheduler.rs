//! # Health Monitor Scheduler
//!
//! One background task per probed service. Each tick:
//!
//! 1. probe the service (or synthesise a failure if its breaker is open)
//! 2. feed the outcome through the service's state machine
//! 3. classify the check and recompute the [`SystemHealthSummary`]
//! 4. publish the summary to the external store under `health:system:summary`
//! 5. hand failing summaries to the [`AlertDispatcher`] (subject to cooldown)
//! 6. append the check to the service's bounded history
//!
//! Task handles live in an explicit registry; `shutdown()` signals every task
//! over a watch channel, aborts stragglers and clears the registry.

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::probe::{ProbeError, ProbeOutcome};
use super::registry::{ServiceEntry, ServiceRegistry};
use super::system_metrics::SystemMetricsSampler;
use super::types::{CheckStatus, HealthCheckResult, ServiceHealth, ServiceStatus, SystemHealthSummary};
use crate::alerts::{AlertCooldown, AlertDispatcher, AlertPayload};
use crate::cache::{best_effort, ResultCache};
use crate::config::MonitorConfig;
use crate::degradation::metrics::DegradationMetrics;

/// External store key for the published summary
pub const SYSTEM_SUMMARY_KEY: &str = "health:system:summary";

/// How long `shutdown()` waits for a task to notice the signal before aborting it
const TASK_STOP_GRACE: Duration = Duration::from_secs(1);

/// State shared between the scheduler handle and its tasks
struct MonitorState {
    registry: Arc<ServiceRegistry>,
    metrics: Arc<DegradationMetrics>,
    cache: Arc<ResultCache>,
    dispatcher: Arc<dyn AlertDispatcher>,
    sampler: SystemMetricsSampler,
    cooldown: AlertCooldown,
    summary: RwLock<SystemHealthSummary>,
    config: MonitorConfig,
}

/// Periodic prober and summary aggregator
pub struct HealthMonitorScheduler {
    state: Arc<MonitorState>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for HealthMonitorScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitorScheduler")
            .field("probe_timeout_ms", &self.state.config.probe_timeout_ms)
            .field("tasks", &self.tasks.lock().len())
            .field("shut_down", &self.shut_down.load(Ordering::Acquire))
            .finish()
    }
}

impl HealthMonitorScheduler {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        metrics: Arc<DegradationMetrics>,
        cache: Arc<ResultCache>,
        dispatcher: Arc<dyn AlertDispatcher>,
        config: MonitorConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            state: Arc::new(MonitorState {
                registry,
                metrics,
                cache,
                dispatcher,
                sampler: SystemMetricsSampler::new(config.collect_system_metrics),
                cooldown: AlertCooldown::new(config.alert_cooldown()),
                summary: RwLock::new(SystemHealthSummary::default()),
                config,
            }),
            shutdown_tx,
            tasks: Mutex::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Spawn the periodic check task for `entry`
    ///
    /// Returns false (and spawns nothing) when the service has no probe, already
    /// has a task, or the scheduler has been shut down.
    pub fn start_service(&self, entry: Arc<ServiceEntry>) -> bool {
        if self.is_shut_down() || entry.probe().is_none() {
            return false;
        }

        let mut tasks = self.tasks.lock();
        if tasks.contains_key(entry.name()) {
            return false;
        }

        let interval = entry.config().health_check_interval();
        let name = entry.name().to_string();
        let state = self.state.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!(
            service = %name,
            interval_ms = interval.as_millis() as u64,
            probe_timeout_ms = state.config.probe_timeout_ms,
            "Starting health monitor task"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let outcome = state.probe(&entry).await;
                        state.observe(&entry, outcome).await;
                    }
                }
            }

            debug!(service = entry.name(), "Health monitor task stopped");
        });

        tasks.insert(name, handle);
        true
    }

    /// Apply an externally obtained probe outcome exactly as a tick would
    pub async fn observe(&self, entry: &ServiceEntry, outcome: ProbeOutcome) -> HealthCheckResult {
        self.state.observe(entry, outcome).await
    }

    /// Run one probe for `entry` now, outside its schedule
    pub async fn check_now(&self, entry: &ServiceEntry) -> HealthCheckResult {
        let outcome = self.state.probe(entry).await;
        self.state.observe(entry, outcome).await
    }

    pub fn summary(&self) -> SystemHealthSummary {
        self.state.summary.read().clone()
    }

    /// Tasks still running
    pub fn active_tasks(&self) -> usize {
        self.tasks
            .lock()
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stop every task; later calls are no-ops
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        self.shutdown_tx.send_replace(true);
        let handles: Vec<(String, JoinHandle<()>)> = self.tasks.lock().drain().collect();
        let count = handles.len();

        for (service, mut handle) in handles {
            if tokio::time::timeout(TASK_STOP_GRACE, &mut handle).await.is_err() {
                warn!(service = %service, "Health monitor task did not stop in time, aborting");
                handle.abort();
            }
        }

        info!(tasks = count, "🛑 Health monitor scheduler stopped");
    }
}

impl Drop for HealthMonitorScheduler {
    fn drop(&mut self) {
        for handle in self.tasks.get_mut().values() {
            handle.abort();
        }
    }
}

impl MonitorState {
    async fn probe(&self, entry: &ServiceEntry) -> ProbeOutcome {
        if entry.breaker_open() {
            debug!(service = entry.name(), "Circuit breaker open, skipping probe");
            return ProbeOutcome::from_error(&ProbeError::CircuitOpen(entry.name().to_string()), 0);
        }

        let Some(probe) = entry.probe() else {
            return ProbeOutcome::healthy(0);
        };

        let timeout = self.config.probe_timeout();
        let started = Instant::now();
        let call = AssertUnwindSafe(probe.check_health(timeout)).catch_unwind();
        let result = tokio::time::timeout(timeout, call).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(Ok(outcome))) => outcome,
            Ok(Ok(Err(e))) => ProbeOutcome::from_error(&e, elapsed_ms),
            Ok(Err(_panic)) => {
                error!(service = entry.name(), "Health probe panicked");
                ProbeOutcome::unhealthy(elapsed_ms, "health probe panicked")
            }
            Err(_) => ProbeOutcome::from_error(&ProbeError::Timeout(timeout), elapsed_ms),
        }
    }

    async fn observe(&self, entry: &ServiceEntry, outcome: ProbeOutcome) -> HealthCheckResult {
        let (transition, health) = entry.record_probe(&outcome, &self.metrics);
        let check = classify(
            entry.name(),
            &outcome,
            &health,
            self.config.slow_response_threshold_ms,
        );

        if transition.changed() {
            debug!(
                service = entry.name(),
                from = %transition.from,
                to = %transition.to,
                check = ?check.status,
                "Health check changed service status"
            );
        }

        entry.push_history(check.clone());

        let summary = self.recompute_summary();
        let ttl = entry.config().health_check_interval() * 2;
        best_effort(
            "publish",
            SYSTEM_SUMMARY_KEY,
            self.cache.publish(SYSTEM_SUMMARY_KEY, &summary, ttl),
        )
        .await;

        self.dispatch_alert(&summary);
        check
    }

    fn recompute_summary(&self) -> SystemHealthSummary {
        let checks: Vec<HealthCheckResult> = self
            .registry
            .entries()
            .iter()
            .filter_map(|entry| entry.latest_check())
            .collect();
        let summary = SystemHealthSummary::from_checks(checks, self.sampler.sample());
        *self.summary.write() = summary.clone();
        summary
    }

    fn dispatch_alert(&self, summary: &SystemHealthSummary) {
        let Some(payload) = AlertPayload::from_summary(summary) else {
            return;
        };
        // Every failing service is stamped, so none is skipped by short-circuiting
        let admitted = payload
            .details
            .iter()
            .filter(|detail| self.cooldown.try_acquire(&detail.service))
            .count();
        if admitted == 0 {
            debug!(failing = payload.details.len(), "Alert suppressed by cooldown");
            return;
        }

        let dispatcher = self.dispatcher.clone();
        let timeout = self.config.alert_timeout();
        tokio::spawn(async move {
            let alert_id = payload.id;
            match tokio::time::timeout(timeout, dispatcher.notify(payload)).await {
                Ok(Ok(())) => debug!(alert_id = %alert_id, "Alert dispatched"),
                Ok(Err(e)) => warn!(alert_id = %alert_id, error = %e, "Alert dispatch failed"),
                Err(_) => warn!(
                    alert_id = %alert_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Alert dispatch timed out"
                ),
            }
        });
    }
}

/// Map a probe outcome and the resulting health onto a check status
pub fn classify(
    service: &str,
    outcome: &ProbeOutcome,
    health: &ServiceHealth,
    slow_response_threshold_ms: u64,
) -> HealthCheckResult {
    let (status, message) = if !outcome.healthy {
        let status = if health.status == ServiceStatus::Unavailable {
            CheckStatus::Critical
        } else {
            CheckStatus::Failed
        };
        (status, outcome.error.clone())
    } else if matches!(
        health.status,
        ServiceStatus::Recovering | ServiceStatus::Degraded
    ) {
        (CheckStatus::Warning, Some(format!("service {}", health.status)))
    } else if outcome.latency_ms > slow_response_threshold_ms {
        (
            CheckStatus::Warning,
            Some(format!("slow response: {}ms", outcome.latency_ms)),
        )
    } else {
        (CheckStatus::Healthy, None)
    };

    HealthCheckResult {
        service: service.to_string(),
        status,
        service_status: health.status,
        latency_ms: outcome.latency_ms,
        message,
        timestamp: health.last_check.unwrap_or_else(chrono::Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health(status: ServiceStatus) -> ServiceHealth {
        ServiceHealth {
            status,
            ..ServiceHealth::new()
        }
    }

    #[test]
    fn test_classify_failures() {
        let failed = ProbeOutcome::unhealthy(10, "refused");
        assert_eq!(
            classify("db", &failed, &health(ServiceStatus::Degraded), 1_000).status,
            CheckStatus::Failed
        );
        let critical = classify("db", &failed, &health(ServiceStatus::Unavailable), 1_000);
        assert_eq!(critical.status, CheckStatus::Critical);
        assert_eq!(critical.message.as_deref(), Some("refused"));
    }

    #[test]
    fn test_classify_warnings() {
        let ok = ProbeOutcome::healthy(10);
        assert_eq!(
            classify("db", &ok, &health(ServiceStatus::Recovering), 1_000).status,
            CheckStatus::Warning
        );
        assert_eq!(
            classify("db", &ok, &health(ServiceStatus::Healthy), 1_000).status,
            CheckStatus::Healthy
        );

        let slow = ProbeOutcome::healthy(2_500);
        let check = classify("db", &slow, &health(ServiceStatus::Healthy), 1_000);
        assert_eq!(check.status, CheckStatus::Warning);
        assert!(check.message.unwrap().contains("2500ms"));
    }
}
