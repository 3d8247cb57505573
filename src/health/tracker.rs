//! # Service Health Tracker
//!
//! State machine for a single monitored service:
//!
//! ```text
//!   Healthy ──failures ≥ max/2──▶ Degraded ──failures ≥ max──▶ Unavailable
//!      ▲                            │                              │
//!      │                         success                        success
//!      │                            ▼                              ▼
//!      └──── successes ≥ recovery_threshold ──── Recovering ◀──────┘
//! ```
//!
//! Probe results drive transitions. Live call outcomes from the executor only
//! adjust counters. Recovery uses its own consecutive-success counter, so the
//! failure counter never has to go negative.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::probe::ProbeOutcome;
use super::types::{ServiceHealth, ServiceStatus};
use crate::degradation::metrics::DegradationRecord;
use crate::degradation::policy::DegradationConfig;

/// What a single update did to the state machine
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub from: ServiceStatus,
    pub to: ServiceStatus,
    /// Present only on a transition into Unavailable
    pub degradation: Option<DegradationRecord>,
    /// Present when the update completed a recovery to Healthy
    pub recovered_at: Option<DateTime<Utc>>,
}

impl TransitionOutcome {
    fn unchanged(status: ServiceStatus) -> Self {
        Self {
            from: status,
            to: status,
            degradation: None,
            recovered_at: None,
        }
    }

    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Owns the health record of one service
#[derive(Debug, Clone)]
pub struct ServiceHealthTracker {
    service: String,
    config: DegradationConfig,
    health: ServiceHealth,
}

impl ServiceHealthTracker {
    pub fn new(service: impl Into<String>, config: DegradationConfig) -> Self {
        Self {
            service: service.into(),
            config,
            health: ServiceHealth::new(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn config(&self) -> &DegradationConfig {
        &self.config
    }

    pub fn health(&self) -> &ServiceHealth {
        &self.health
    }

    pub fn status(&self) -> ServiceStatus {
        self.health.status
    }

    /// Feed a probe result into the state machine
    pub fn record_probe(&mut self, outcome: &ProbeOutcome) -> TransitionOutcome {
        if outcome.healthy {
            self.record_success(outcome.latency_ms)
        } else {
            self.record_failure(outcome.latency_ms, outcome.error.as_deref())
        }
    }

    /// Successful probe
    pub fn record_success(&mut self, latency_ms: u64) -> TransitionOutcome {
        let now = Utc::now();
        self.observe(now, latency_ms);
        self.health.consecutive_failures = 0;

        let from = self.health.status;
        let mut outcome = TransitionOutcome::unchanged(from);

        match from {
            ServiceStatus::Healthy => {}
            ServiceStatus::Unavailable | ServiceStatus::Degraded => {
                self.health.consecutive_successes = 1;
                self.health.status = ServiceStatus::Recovering;
                info!(
                    service = %self.service,
                    from = %from,
                    recovery_threshold = self.config.recovery_threshold,
                    "🟡 Service recovering"
                );
            }
            ServiceStatus::Recovering => {
                self.health.consecutive_successes += 1;
            }
        }

        if self.health.status == ServiceStatus::Recovering {
            if self.health.consecutive_successes >= self.config.recovery_threshold {
                self.complete_recovery(now);
                outcome.recovered_at = Some(now);
            } else {
                let remaining =
                    self.config.recovery_threshold - self.health.consecutive_successes;
                self.health.recovery_estimate =
                    recovery_estimate(now, &self.config, remaining);
            }
        }

        self.recompute_uptime();
        outcome.to = self.health.status;
        outcome
    }

    /// Failed probe (error or timeout)
    pub fn record_failure(&mut self, latency_ms: u64, error: Option<&str>) -> TransitionOutcome {
        let now = Utc::now();
        self.observe(now, latency_ms);
        self.health.error_count += 1;
        self.health.consecutive_failures += 1;
        self.health.consecutive_successes = 0;

        let from = self.health.status;
        let mut outcome = TransitionOutcome::unchanged(from);
        let failures = self.health.consecutive_failures;

        if failures >= self.config.max_consecutive_failures {
            if from != ServiceStatus::Unavailable {
                let reason = format!("{failures} consecutive failures");
                self.health.status = ServiceStatus::Unavailable;
                self.health.degradation_reason = Some(reason.clone());
                self.health.unavailable_since.get_or_insert(now);
                self.health.recovery_estimate =
                    recovery_estimate(now, &self.config, self.config.recovery_threshold);

                warn!(
                    service = %self.service,
                    from = %from,
                    consecutive_failures = failures,
                    max_consecutive_failures = self.config.max_consecutive_failures,
                    error = error.unwrap_or("unknown"),
                    "🔴 Service unavailable"
                );
                outcome.degradation = Some(DegradationRecord::new(&self.service, reason));
            }
        } else if failures >= self.config.degraded_threshold()
            && from != ServiceStatus::Degraded
        {
            // force_status(Unavailable) zeroes the streak, so the next failure
            // re-enters through Degraded rather than staying Unavailable.
            self.health.status = ServiceStatus::Degraded;
            self.health.degradation_reason = Some(match error {
                Some(e) => format!("{failures} consecutive failures: {e}"),
                None => format!("{failures} consecutive failures"),
            });
            warn!(
                service = %self.service,
                from = %from,
                consecutive_failures = failures,
                "🟠 Service degraded"
            );
        } else {
            debug!(
                service = %self.service,
                status = %from,
                consecutive_failures = failures,
                "Health probe failed below degradation threshold"
            );
        }

        self.recompute_uptime();
        outcome.to = self.health.status;
        outcome
    }

    /// Successful live call made through the executor
    pub fn record_live_success(&mut self, latency_ms: u64) {
        self.observe(Utc::now(), latency_ms);
        self.health.consecutive_failures = self.health.consecutive_failures.saturating_sub(1);
        self.recompute_uptime();
    }

    /// Failed live call made through the executor
    pub fn record_live_failure(&mut self, latency_ms: u64) {
        self.observe(Utc::now(), latency_ms);
        self.health.error_count += 1;
        self.health.consecutive_failures += 1;
        self.recompute_uptime();
    }

    /// Operator/test override; clears every counter-driven field
    pub fn force_status(&mut self, status: ServiceStatus, reason: Option<String>) {
        let from = self.health.status;
        let now = Utc::now();

        self.health.status = status;
        self.health.consecutive_failures = 0;
        self.health.consecutive_successes = 0;
        self.health.degradation_reason = reason;
        self.health.recovery_estimate = None;
        self.health.unavailable_since = match status {
            ServiceStatus::Unavailable => Some(now),
            _ => None,
        };

        warn!(
            service = %self.service,
            from = %from,
            to = %status,
            "🚨 Service status forced"
        );
    }

    fn complete_recovery(&mut self, now: DateTime<Utc>) {
        let outage_ms = self
            .health
            .unavailable_since
            .map(|since| (now - since).num_milliseconds().max(0));

        self.health.status = ServiceStatus::Healthy;
        self.health.consecutive_successes = 0;
        self.health.degradation_reason = None;
        self.health.recovery_estimate = None;
        self.health.unavailable_since = None;

        info!(
            service = %self.service,
            outage_ms = outage_ms,
            recovery_threshold = self.config.recovery_threshold,
            "🟢 Service recovered"
        );
    }

    fn observe(&mut self, now: DateTime<Utc>, latency_ms: u64) {
        self.health.last_check = Some(now);
        self.health.response_time_ms = latency_ms;
        self.health.total_checks += 1;
    }

    fn recompute_uptime(&mut self) {
        let total = self.health.total_checks;
        self.health.uptime_percent = if total == 0 {
            100.0
        } else {
            let successful = total.saturating_sub(self.health.error_count);
            (successful as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        };
    }
}

/// `now + checks × interval`, or `None` when that is not a representable time
fn recovery_estimate(
    now: DateTime<Utc>,
    config: &DegradationConfig,
    checks: u32,
) -> Option<DateTime<Utc>> {
    let millis = config
        .health_check_interval_ms
        .checked_mul(u64::from(checks))?;
    let span = chrono::Duration::try_milliseconds(i64::try_from(millis).ok()?)?;
    now.checked_add_signed(span)
}
