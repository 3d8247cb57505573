//! # Degradation Metrics
//!
//! Process-wide counters for degradation events and fallback outcomes, plus a
//! bounded history of outages (oldest evicted first).

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Default number of outage records retained
pub const DEFAULT_HISTORY_CAPACITY: usize = 1_000;

/// One transition of a service into Unavailable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationRecord {
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub reason: String,
    /// Outage length, filled in once the service is Healthy again
    pub duration_ms: Option<u64>,
}

impl DegradationRecord {
    pub fn new(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            service: service.into(),
            reason: reason.into(),
            duration_ms: None,
        }
    }
}

/// Point-in-time copy of the metrics
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DegradationMetricsSnapshot {
    pub total_degradations: u64,
    pub successful_fallbacks: u64,
    pub failed_operations: u64,
    pub most_failed_service: Option<String>,
    pub degradation_history: Vec<DegradationRecord>,
}

#[derive(Debug, Default)]
struct MetricsState {
    total_degradations: u64,
    successful_fallbacks: u64,
    failed_operations: u64,
    failures_by_service: HashMap<String, u64>,
    history: VecDeque<DegradationRecord>,
}

/// Shared degradation counters, written by scheduler ticks and live executor calls
#[derive(Debug)]
pub struct DegradationMetrics {
    state: Mutex<MetricsState>,
    capacity: usize,
}

impl DegradationMetrics {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(MetricsState::default()),
            capacity: capacity.max(1),
        }
    }

    /// Append an outage record, evicting the oldest when full
    pub fn record_degradation(&self, record: DegradationRecord) {
        let mut state = self.state.lock();
        state.total_degradations += 1;
        if state.history.len() >= self.capacity {
            state.history.pop_front();
        }
        state.history.push_back(record);
    }

    /// Close every open record for `service`, measuring each up to `recovered_at`
    ///
    /// Returns the number of records closed.
    pub fn complete_degradation(&self, service: &str, recovered_at: DateTime<Utc>) -> usize {
        let mut state = self.state.lock();
        let mut closed = 0;
        for record in state
            .history
            .iter_mut()
            .filter(|r| r.service == service && r.duration_ms.is_none())
        {
            let elapsed = (recovered_at - record.timestamp).num_milliseconds().max(0);
            record.duration_ms = Some(elapsed as u64);
            closed += 1;
        }
        closed
    }

    pub fn record_service_failure(&self, service: &str) {
        let mut state = self.state.lock();
        *state
            .failures_by_service
            .entry(service.to_string())
            .or_insert(0) += 1;
    }

    pub fn record_successful_fallback(&self) {
        self.state.lock().successful_fallbacks += 1;
    }

    pub fn record_failed_operation(&self) {
        self.state.lock().failed_operations += 1;
    }

    pub fn total_degradations(&self) -> u64 {
        self.state.lock().total_degradations
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    pub fn snapshot(&self) -> DegradationMetricsSnapshot {
        let state = self.state.lock();
        // Ties resolve to the alphabetically first name so the answer is stable
        let most_failed_service = state
            .failures_by_service
            .iter()
            .max_by(|(a_name, a), (b_name, b)| a.cmp(b).then_with(|| b_name.cmp(a_name)))
            .map(|(name, _)| name.clone());

        DegradationMetricsSnapshot {
            total_degradations: state.total_degradations,
            successful_fallbacks: state.successful_fallbacks,
            failed_operations: state.failed_operations,
            most_failed_service,
            degradation_history: state.history.iter().cloned().collect(),
        }
    }
}

impl Default for DegradationMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded_and_evicts_oldest() {
        let metrics = DegradationMetrics::new(3);
        for i in 0..5 {
            metrics.record_degradation(DegradationRecord::new(format!("svc-{i}"), "down"));
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_degradations, 5);
        assert_eq!(snapshot.degradation_history.len(), 3);
        assert_eq!(snapshot.degradation_history[0].service, "svc-2");
        assert_eq!(snapshot.degradation_history[2].service, "svc-4");
    }

    #[test]
    fn test_complete_degradation_closes_open_records() {
        let metrics = DegradationMetrics::default();
        let mut record = DegradationRecord::new("db", "3 consecutive failures");
        record.timestamp = Utc::now() - chrono::Duration::milliseconds(1_500);
        let started = record.timestamp;
        metrics.record_degradation(record);
        metrics.record_degradation(DegradationRecord::new("cache", "3 consecutive failures"));

        let recovered_at = started + chrono::Duration::milliseconds(1_500);
        assert_eq!(metrics.complete_degradation("db", recovered_at), 1);
        assert_eq!(metrics.complete_degradation("db", recovered_at), 0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.degradation_history[0].duration_ms, Some(1_500));
        assert_eq!(snapshot.degradation_history[1].duration_ms, None);
    }

    #[test]
    fn test_most_failed_service() {
        let metrics = DegradationMetrics::default();
        assert_eq!(metrics.snapshot().most_failed_service, None);

        metrics.record_service_failure("cache");
        metrics.record_service_failure("payments");
        metrics.record_service_failure("payments");

        assert_eq!(
            metrics.snapshot().most_failed_service.as_deref(),
            Some("payments")
        );
    }

    #[test]
    fn test_fallback_counters() {
        let metrics = DegradationMetrics::default();
        metrics.record_successful_fallback();
        metrics.record_successful_fallback();
        metrics.record_failed_operation();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.successful_fallbacks, 2);
        assert_eq!(snapshot.failed_operations, 1);
    }
}
