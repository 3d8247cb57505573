//! # Degradation Policy
//!
//! Per-service configuration describing how calls are rerouted when the service is
//! not healthy, plus the pure resolution function the executor consults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use validator::Validate;

use crate::health::types::{ServiceHealth, ServiceStatus};

/// Minimum allowed probe period; bounds probe overhead per dependency
pub const MIN_HEALTH_CHECK_INTERVAL_MS: u64 = 5_000;

/// What to do with calls to a service that is not healthy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DegradationStrategy {
    /// Never reroute; the primary's error reaches the caller
    FailFast,
    /// Serve a previously cached result
    CachedResponse,
    /// Serve a reduced response built by a fallback
    SimplifiedResponse,
    /// Call an alternative provider
    FallbackService,
    /// Serve locally available data only
    OfflineMode,
    /// Fall back while the failure streak is below the retry budget
    RetryWithBackoff,
    /// Unrecognised strategy name from configuration; resolves toward availability
    Unknown,
}

impl DegradationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailFast => "fail_fast",
            Self::CachedResponse => "cached_response",
            Self::SimplifiedResponse => "simplified_response",
            Self::FallbackService => "fallback_service",
            Self::OfflineMode => "offline_mode",
            Self::RetryWithBackoff => "retry_with_backoff",
            Self::Unknown => "unknown",
        }
    }
}

impl From<String> for DegradationStrategy {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_fast" | "failfast" => Self::FailFast,
            "cached_response" | "cachedresponse" => Self::CachedResponse,
            "simplified_response" | "simplifiedresponse" => Self::SimplifiedResponse,
            "fallback_service" | "fallbackservice" => Self::FallbackService,
            "offline_mode" | "offlinemode" => Self::OfflineMode,
            "retry_with_backoff" | "retrywithbackoff" => Self::RetryWithBackoff,
            _ => Self::Unknown,
        }
    }
}

impl From<DegradationStrategy> for String {
    fn from(value: DegradationStrategy) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DegradationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business priority of a dependency, used for alert severity and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Critical,
    High,
    Medium,
    Low,
}

/// Degradation settings for one monitored service
///
/// Immutable once the service is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case", default)]
pub struct DegradationConfig {
    pub strategy: DegradationStrategy,

    /// Probe period (milliseconds)
    #[validate(range(min = 5000, max = 86400000))]
    pub health_check_interval_ms: u64,

    /// Consecutive failures that make the service Unavailable
    #[validate(range(min = 1, max = 1000))]
    pub max_consecutive_failures: u32,

    /// Consecutive successes needed to leave Recovering
    #[validate(range(min = 1, max = 1000))]
    pub recovery_threshold: u32,

    /// Failure streak below which `RetryWithBackoff` still falls back
    #[validate(range(max = 100))]
    pub retry_count: u32,

    /// Base delay between fallback attempts under `RetryWithBackoff` (milliseconds)
    pub retry_delay_ms: u64,

    /// Upper bound on how long a fallback result for this service may be cached (milliseconds)
    #[validate(range(min = 1))]
    pub cache_timeout_ms: u64,

    pub priority_level: PriorityLevel,
}

impl DegradationConfig {
    pub fn for_database() -> Self {
        Self {
            strategy: DegradationStrategy::CachedResponse,
            max_consecutive_failures: 3,
            recovery_threshold: 3,
            priority_level: PriorityLevel::Critical,
            ..Default::default()
        }
    }

    pub fn for_cache() -> Self {
        Self {
            strategy: DegradationStrategy::FallbackService,
            max_consecutive_failures: 3,
            recovery_threshold: 2,
            cache_timeout_ms: 60_000,
            priority_level: PriorityLevel::High,
            ..Default::default()
        }
    }

    pub fn for_external_api() -> Self {
        Self {
            strategy: DegradationStrategy::RetryWithBackoff,
            health_check_interval_ms: 60_000,
            max_consecutive_failures: 5,
            recovery_threshold: 2,
            retry_count: 3,
            retry_delay_ms: 1_000,
            priority_level: PriorityLevel::Medium,
            ..Default::default()
        }
    }

    pub fn for_notifications() -> Self {
        Self {
            strategy: DegradationStrategy::OfflineMode,
            health_check_interval_ms: 60_000,
            max_consecutive_failures: 5,
            recovery_threshold: 2,
            priority_level: PriorityLevel::Low,
            ..Default::default()
        }
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    /// Failure streak at which the service is marked Degraded
    pub fn degraded_threshold(&self) -> u32 {
        self.max_consecutive_failures / 2
    }
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            strategy: DegradationStrategy::CachedResponse,
            health_check_interval_ms: 30_000,
            max_consecutive_failures: 3,
            recovery_threshold: 2,
            retry_count: 3,
            retry_delay_ms: 500,
            cache_timeout_ms: 300_000,
            priority_level: PriorityLevel::Medium,
        }
    }
}

/// Decide whether a call should be routed to fallbacks instead of the primary
pub fn should_fallback(config: &DegradationConfig, health: &ServiceHealth) -> bool {
    match config.strategy {
        DegradationStrategy::FailFast => false,
        DegradationStrategy::CachedResponse
        | DegradationStrategy::SimplifiedResponse
        | DegradationStrategy::FallbackService
        | DegradationStrategy::OfflineMode => health.status != ServiceStatus::Healthy,
        DegradationStrategy::RetryWithBackoff => {
            health.consecutive_failures < config.retry_count
        }
        // Fail open toward availability
        DegradationStrategy::Unknown => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health_with(status: ServiceStatus, consecutive_failures: u32) -> ServiceHealth {
        let mut health = ServiceHealth::new();
        health.status = status;
        health.consecutive_failures = consecutive_failures;
        health
    }

    #[test]
    fn test_fail_fast_never_falls_back() {
        let config = DegradationConfig {
            strategy: DegradationStrategy::FailFast,
            ..Default::default()
        };
        for status in [
            ServiceStatus::Healthy,
            ServiceStatus::Degraded,
            ServiceStatus::Unavailable,
            ServiceStatus::Recovering,
        ] {
            assert!(!should_fallback(&config, &health_with(status, 10)));
        }
    }

    #[test]
    fn test_rerouting_strategies_follow_status() {
        for strategy in [
            DegradationStrategy::CachedResponse,
            DegradationStrategy::SimplifiedResponse,
            DegradationStrategy::FallbackService,
            DegradationStrategy::OfflineMode,
        ] {
            let config = DegradationConfig {
                strategy,
                ..Default::default()
            };
            assert!(!should_fallback(&config, &health_with(ServiceStatus::Healthy, 0)));
            assert!(should_fallback(&config, &health_with(ServiceStatus::Degraded, 1)));
            assert!(should_fallback(&config, &health_with(ServiceStatus::Unavailable, 3)));
            assert!(should_fallback(&config, &health_with(ServiceStatus::Recovering, 0)));
        }
    }

    #[test]
    fn test_retry_with_backoff_uses_retry_budget() {
        let config = DegradationConfig {
            strategy: DegradationStrategy::RetryWithBackoff,
            retry_count: 2,
            ..Default::default()
        };
        assert!(should_fallback(&config, &health_with(ServiceStatus::Unavailable, 1)));
        assert!(!should_fallback(&config, &health_with(ServiceStatus::Unavailable, 2)));
        assert!(!should_fallback(&config, &health_with(ServiceStatus::Unavailable, 5)));
    }

    #[test]
    fn test_unknown_strategy_fails_open() {
        let config = DegradationConfig {
            strategy: DegradationStrategy::from("circuit_magic".to_string()),
            ..Default::default()
        };
        assert_eq!(config.strategy, DegradationStrategy::Unknown);
        assert!(should_fallback(&config, &health_with(ServiceStatus::Healthy, 0)));
    }

    #[test]
    fn test_strategy_parsing_is_lenient() {
        assert_eq!(
            DegradationStrategy::from("Cached-Response".to_string()),
            DegradationStrategy::CachedResponse
        );
        assert_eq!(
            DegradationStrategy::from("retryWithBackoff".to_string()),
            DegradationStrategy::RetryWithBackoff
        );
        let json = serde_json::to_string(&DegradationStrategy::OfflineMode).unwrap();
        assert_eq!(json, "\"offline_mode\"");
    }

    #[test]
    fn test_config_validation() {
        assert!(DegradationConfig::default().validate().is_ok());
        assert!(DegradationConfig::for_database().validate().is_ok());
        assert!(DegradationConfig::for_cache().validate().is_ok());
        assert!(DegradationConfig::for_external_api().validate().is_ok());
        assert!(DegradationConfig::for_notifications().validate().is_ok());

        let too_fast = DegradationConfig {
            health_check_interval_ms: 1_000,
            ..Default::default()
        };
        assert!(too_fast.validate().is_err());

        let once_a_day = DegradationConfig {
            health_check_interval_ms: 86_400_000,
            ..Default::default()
        };
        assert!(once_a_day.validate().is_ok());

        let too_slow = DegradationConfig {
            health_check_interval_ms: 86_400_001,
            ..Default::default()
        };
        assert!(too_slow.validate().is_err());

        let zero_failures = DegradationConfig {
            max_consecutive_failures: 0,
            ..Default::default()
        };
        assert!(zero_failures.validate().is_err());

        let zero_recovery = DegradationConfig {
            recovery_threshold: 0,
            ..Default::default()
        };
        assert!(zero_recovery.validate().is_err());
    }

    #[test]
    fn test_degraded_threshold_is_half_rounded_down() {
        let config = DegradationConfig {
            max_consecutive_failures: 5,
            ..Default::default()
        };
        assert_eq!(config.degraded_threshold(), 2);
        assert_eq!(config.health_check_interval(), Duration::from_secs(30));
    }
}
