//! # Engine Configuration
//!
//! Typed, validated settings for the engine's ambient behaviour (probe and alert
//! timeouts, fallback timeouts, cache tiers, metrics retention) plus the
//! per-service degradation tables registered at bootstrap.
//!
//! ## Sources
//!
//! 1. `.env` (via dotenvy, if present)
//! 2. Optional TOML file (explicit path or `RESILIENCE_CONFIG_PATH`)
//! 3. Environment variables prefixed `RESILIENCE__`, nested with `__`
//!    (e.g. `RESILIENCE__MONITOR__PROBE_TIMEOUT_MS=2000`)
//!
//! Every field has a default, so an empty configuration is valid.
//!
//! ```toml
//! [monitor]
//! probe_timeout_ms = 5000
//!
//! [cache]
//! backend = "moka"
//!
//! [services.payments]
//! strategy = "fallback_service"
//! max_consecutive_failures = 5
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

use crate::degradation::policy::DegradationConfig;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case", default)]
pub struct EngineConfig {
    #[validate(nested)]
    pub monitor: MonitorConfig,

    #[validate(nested)]
    pub executor: ExecutorConfig,

    #[validate(nested)]
    pub cache: CacheConfig,

    #[validate(nested)]
    pub metrics: MetricsConfig,

    /// Services registered by `ResilienceEngine::from_config`
    pub services: HashMap<String, DegradationConfig>,
}

impl EngineConfig {
    /// Validate every section, including each service table
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.validate()
            .map_err(ConfigurationError::validation_error)?;

        for (name, service) in &self.services {
            if name.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "services",
                    name.clone(),
                    "service name must not be empty",
                ));
            }
            service
                .validate()
                .map_err(|e| ConfigurationError::invalid_service_config(name.clone(), e))?;
        }

        if self.cache.backend == CacheBackendKind::Redis
            && self.cache.redis_url.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigurationError::invalid_value(
                "cache.redis_url",
                "",
                "redis backend requires a URL",
            ));
        }

        Ok(())
    }
}

/// Health monitor scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case", default)]
pub struct MonitorConfig {
    /// Upper bound on one probe call (milliseconds)
    #[validate(range(min = 1, max = 300000))]
    pub probe_timeout_ms: u64,

    /// Successful probes slower than this are reported as Warning (milliseconds)
    #[validate(range(min = 1))]
    pub slow_response_threshold_ms: u64,

    /// Age after which per-service history entries are trimmed (seconds)
    #[validate(range(min = 60, max = 604800))]
    pub history_retention_secs: u64,

    /// Hard cap on per-service history entries
    #[validate(range(min = 1, max = 100000))]
    pub max_history_entries: usize,

    /// Upper bound on one alert dispatch (milliseconds)
    #[validate(range(min = 1, max = 60000))]
    pub alert_timeout_ms: u64,

    /// Minimum gap between two alerts from the same engine (milliseconds)
    pub alert_cooldown_ms: u64,

    /// Sample host memory/CPU/disk on every tick
    pub collect_system_metrics: bool,
}

impl MonitorConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn alert_timeout(&self) -> Duration {
        Duration::from_millis(self.alert_timeout_ms)
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_millis(self.alert_cooldown_ms)
    }

    pub fn history_retention(&self) -> Duration {
        Duration::from_secs(self.history_retention_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5_000,
            slow_response_threshold_ms: 1_000,
            history_retention_secs: 86_400,
            // 24 hours of 30 second ticks
            max_history_entries: 2_880,
            alert_timeout_ms: 5_000,
            alert_cooldown_ms: 300_000,
            collect_system_metrics: true,
        }
    }
}

/// Fallback executor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case", default)]
pub struct ExecutorConfig {
    /// Timeout for a fallback without its own timeout (milliseconds)
    #[validate(range(min = 1, max = 600000))]
    pub fallback_timeout_ms: u64,

    /// Cap on the backoff delay between fallback attempts (milliseconds)
    pub max_backoff_ms: u64,
}

impl ExecutorConfig {
    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            fallback_timeout_ms: 10_000,
            max_backoff_ms: 30_000,
        }
    }
}

/// Which external cache store backs the second tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    #[default]
    None,
    Moka,
    Redis,
}

/// Fallback result cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case", default)]
pub struct CacheConfig {
    /// Entry cap for the in-process tier (and the moka external backend)
    #[validate(range(min = 1))]
    pub local_max_capacity: u64,

    /// Maximum age of an in-process entry (milliseconds)
    #[validate(range(min = 1))]
    pub local_freshness_ms: u64,

    /// Upper bound on one external cache call (milliseconds)
    #[validate(range(min = 1, max = 1000))]
    pub operation_timeout_ms: u64,

    pub backend: CacheBackendKind,

    pub redis_url: Option<String>,
}

impl CacheConfig {
    pub fn local_freshness(&self) -> Duration {
        Duration::from_millis(self.local_freshness_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local_max_capacity: 10_000,
            local_freshness_ms: 300_000,
            operation_timeout_ms: 50,
            backend: CacheBackendKind::None,
            redis_url: None,
        }
    }
}

/// Degradation metrics settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case", default)]
pub struct MetricsConfig {
    #[validate(range(min = 1, max = 1000000))]
    pub max_degradation_history: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_degradation_history: crate::degradation::metrics::DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::degradation::policy::DegradationStrategy;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate_all().is_ok());
        assert_eq!(config.cache.operation_timeout(), Duration::from_millis(50));
        assert_eq!(config.cache.local_freshness(), Duration::from_secs(300));
        assert_eq!(config.monitor.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.metrics.max_degradation_history, 1_000);
    }

    #[test]
    fn test_cache_timeout_is_bounded() {
        let mut config = EngineConfig::default();
        config.cache.operation_timeout_ms = 5_000;
        assert!(config.validate_all().is_err());
    }

    #[test]
    fn test_service_table_validation() {
        let mut config = EngineConfig::default();
        config.services.insert(
            "payments".to_string(),
            DegradationConfig {
                health_check_interval_ms: 100,
                ..Default::default()
            },
        );

        let err = config.validate_all().unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidServiceConfig { ref service, .. } if service == "payments"
        ));
    }

    #[test]
    fn test_redis_backend_requires_url() {
        let mut config = EngineConfig::default();
        config.cache.backend = CacheBackendKind::Redis;
        assert!(config.validate_all().is_err());

        config.cache.redis_url = Some("redis://localhost:6379".to_string());
        assert!(config.validate_all().is_ok());
    }

    #[test]
    fn test_partial_service_table_uses_defaults() {
        let config: EngineConfig = serde_json::from_value(serde_json::json!({
            "services": { "payments": { "strategy": "fallback_service" } }
        }))
        .unwrap();

        let payments = &config.services["payments"];
        assert_eq!(payments.strategy, DegradationStrategy::FallbackService);
        assert_eq!(payments.max_consecutive_failures, 3);
        assert_eq!(config.monitor, MonitorConfig::default());
    }
}
