//! # Health Status Types
//!
//! Shared types for per-service health state and the system-wide summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Per-service state
// =============================================================================

/// Health state of a single monitored service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    #[default]
    Healthy,
    Degraded,
    Unavailable,
    Recovering,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unavailable => "unavailable",
            Self::Recovering => "recovering",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one service's health record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: ServiceStatus,
    /// Most recent observation (probe or live call)
    pub last_check: Option<DateTime<Utc>>,
    /// Latency of the most recent observation
    pub response_time_ms: u64,
    /// Total failures ever observed
    pub error_count: u64,
    /// Reset on any probe success
    pub consecutive_failures: u32,
    /// Successes since entering Recovering
    pub consecutive_successes: u32,
    pub total_checks: u64,
    pub uptime_percent: f64,
    pub degradation_reason: Option<String>,
    /// Advisory only
    pub recovery_estimate: Option<DateTime<Utc>>,
    /// Start of the current outage, cleared on recovery
    pub unavailable_since: Option<DateTime<Utc>>,
}

impl ServiceHealth {
    pub fn new() -> Self {
        Self {
            status: ServiceStatus::Healthy,
            last_check: None,
            response_time_ms: 0,
            error_count: 0,
            consecutive_failures: 0,
            consecutive_successes: 0,
            total_checks: 0,
            uptime_percent: 100.0,
            degradation_reason: None,
            recovery_estimate: None,
            unavailable_since: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == ServiceStatus::Healthy
    }
}

impl Default for ServiceHealth {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Check results and summary
// =============================================================================

/// Classification of a single health check result
///
/// Ordered by severity so the worst check can be found with `max()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Healthy,
    Warning,
    Failed,
    Critical,
}

impl CheckStatus {
    /// Failed or Critical
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Critical)
    }
}

/// Outcome of one scheduled check for one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub service: String,
    pub status: CheckStatus,
    pub service_status: ServiceStatus,
    pub latency_ms: u64,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate status across every check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    #[default]
    Healthy,
    Warning,
    Critical,
}

impl OverallStatus {
    /// Critical if any check failed, else Warning if any warned, else Healthy
    pub fn from_checks<'a>(checks: impl IntoIterator<Item = &'a HealthCheckResult>) -> Self {
        let mut overall = OverallStatus::Healthy;
        for check in checks {
            match check.status {
                CheckStatus::Failed | CheckStatus::Critical => return OverallStatus::Critical,
                CheckStatus::Warning => overall = OverallStatus::Warning,
                CheckStatus::Healthy => {}
            }
        }
        overall
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Host resource utilisation, sampled independently of the service state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SystemMetrics {
    pub memory_usage_percent: f64,
    pub cpu_usage_percent: f64,
    pub disk_usage_percent: f64,
}

/// System-wide health snapshot, recomputed on every scheduler tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealthSummary {
    pub timestamp: DateTime<Utc>,
    pub overall_status: OverallStatus,
    pub healthy_checks: usize,
    pub warning_checks: usize,
    pub failed_checks: usize,
    pub checks: Vec<HealthCheckResult>,
    pub metrics: SystemMetrics,
}

impl SystemHealthSummary {
    pub fn from_checks(checks: Vec<HealthCheckResult>, metrics: SystemMetrics) -> Self {
        let healthy_checks = checks
            .iter()
            .filter(|c| c.status == CheckStatus::Healthy)
            .count();
        let warning_checks = checks
            .iter()
            .filter(|c| c.status == CheckStatus::Warning)
            .count();
        let failed_checks = checks.iter().filter(|c| c.status.is_failure()).count();

        Self {
            timestamp: Utc::now(),
            overall_status: OverallStatus::from_checks(&checks),
            healthy_checks,
            warning_checks,
            failed_checks,
            checks,
            metrics,
        }
    }
}

impl Default for SystemHealthSummary {
    fn default() -> Self {
        Self::from_checks(Vec::new(), SystemMetrics::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(service: &str, status: CheckStatus) -> HealthCheckResult {
        HealthCheckResult {
            service: service.to_string(),
            status,
            service_status: ServiceStatus::Healthy,
            latency_ms: 5,
            message: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_service_health_defaults() {
        let health = ServiceHealth::default();
        assert_eq!(health.status, ServiceStatus::Healthy);
        assert_eq!(health.uptime_percent, 100.0);
        assert!(health.last_check.is_none());
        assert!(health.is_healthy());
    }

    #[test]
    fn test_check_status_ordering() {
        assert!(CheckStatus::Healthy < CheckStatus::Warning);
        assert!(CheckStatus::Warning < CheckStatus::Failed);
        assert!(CheckStatus::Failed < CheckStatus::Critical);
        assert!(CheckStatus::Failed.is_failure());
        assert!(!CheckStatus::Warning.is_failure());
    }

    #[test]
    fn test_overall_status_aggregation() {
        let empty: Vec<HealthCheckResult> = Vec::new();
        assert_eq!(OverallStatus::from_checks(&empty), OverallStatus::Healthy);

        let warn = vec![check("db", CheckStatus::Healthy), check("cache", CheckStatus::Warning)];
        assert_eq!(OverallStatus::from_checks(&warn), OverallStatus::Warning);

        let failed = vec![check("db", CheckStatus::Failed), check("cache", CheckStatus::Warning)];
        assert_eq!(OverallStatus::from_checks(&failed), OverallStatus::Critical);
    }

    #[test]
    fn test_summary_counts() {
        let summary = SystemHealthSummary::from_checks(
            vec![
                check("db", CheckStatus::Healthy),
                check("cache", CheckStatus::Warning),
                check("sms", CheckStatus::Critical),
                check("email", CheckStatus::Failed),
            ],
            SystemMetrics::default(),
        );
        assert_eq!(summary.healthy_checks, 1);
        assert_eq!(summary.warning_checks, 1);
        assert_eq!(summary.failed_checks, 2);
        assert_eq!(summary.overall_status, OverallStatus::Critical);
    }

    #[test]
    fn test_summary_serializes_snake_case() {
        let summary = SystemHealthSummary::default();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["overall_status"], "healthy");
        assert_eq!(json["failed_checks"], 0);
    }
}
