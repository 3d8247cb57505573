//! Bounded per-service history of health check results.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;

use super::types::HealthCheckResult;

/// Rolling window of check results for one service
///
/// Entries older than `retention` are dropped on every append, and the buffer
/// never holds more than `max_entries`.
#[derive(Debug, Clone)]
pub struct HealthHistory {
    entries: VecDeque<HealthCheckResult>,
    retention: Duration,
    max_entries: usize,
}

impl HealthHistory {
    pub fn new(retention: Duration, max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            retention,
            max_entries: max_entries.max(1),
        }
    }

    pub fn push(&mut self, result: HealthCheckResult) {
        let now = result.timestamp;
        self.entries.push_back(result);
        self.trim(now);
    }

    /// Drop entries older than the retention window relative to `now`
    pub fn trim(&mut self, now: DateTime<Utc>) {
        let retention =
            chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(retention);
        if let Some(cutoff) = cutoff {
            while self
                .entries
                .front()
                .is_some_and(|entry| entry.timestamp < cutoff)
            {
                self.entries.pop_front();
            }
        }
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&HealthCheckResult> {
        self.entries.back()
    }

    /// Oldest first
    pub fn to_vec(&self) -> Vec<HealthCheckResult> {
        self.entries.iter().cloned().collect()
    }
}
