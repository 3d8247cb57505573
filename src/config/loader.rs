//! Configuration loader
//!
//! Layers an optional TOML file under `RESILIENCE__*` environment overrides using
//! the `config` crate, deserializes into [`EngineConfig`] and validates it.

use super::error::{ConfigResult, ConfigurationError};
use super::EngineConfig;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the TOML file
pub const CONFIG_PATH_ENV: &str = "RESILIENCE_CONFIG_PATH";

/// Prefix for per-field overrides (`RESILIENCE__SECTION__FIELD`)
pub const ENV_PREFIX: &str = "RESILIENCE";

const ENV_SEPARATOR: &str = "__";

/// Zero-state loader; all functions are associated
#[derive(Debug)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from `RESILIENCE_CONFIG_PATH` (if set) plus environment overrides
    ///
    /// Loads `.env` first when present. Without a config path the result is the
    /// defaults with any environment overrides applied.
    pub fn load_from_env() -> ConfigResult<EngineConfig> {
        dotenvy::dotenv().ok();

        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                info!(path = %path, "Loading configuration from {}", CONFIG_PATH_ENV);
                Self::load_from_path(Path::new(&path))
            }
            _ => {
                debug!("No configuration file set, using defaults and environment overrides");
                Self::build(None, Self::environment(None))
            }
        }
    }

    /// Load a specific TOML file plus environment overrides
    pub fn load_from_path(path: &Path) -> ConfigResult<EngineConfig> {
        if !path.exists() {
            return Err(ConfigurationError::FileNotFound(path.display().to_string()));
        }
        let config = Self::build(Some(path.to_path_buf()), Self::environment(None))?;
        info!(path = %path.display(), services = config.services.len(), "Configuration loaded successfully");
        Ok(config)
    }

    /// Parse TOML text without consulting the process environment
    pub fn from_toml_str(contents: &str) -> ConfigResult<EngineConfig> {
        let config: EngineConfig = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()
            .map_err(|e| ConfigurationError::parse_error("TOML string", e))?;

        config.validate_all()?;
        Ok(config)
    }

    fn build(path: Option<PathBuf>, env: Environment) -> ConfigResult<EngineConfig> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let config: EngineConfig = builder
            .add_source(env)
            .build()?
            .try_deserialize()
            .map_err(|e| ConfigurationError::parse_error("configuration sources", e))?;

        config.validate_all()?;
        Ok(config)
    }

    /// `source` replaces the process environment, used to test overrides in isolation
    fn environment(source: Option<HashMap<String, String>>) -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheBackendKind;
    use crate::degradation::policy::{DegradationStrategy, PriorityLevel};
    use std::io::Write;

    const SAMPLE: &str = r#"
[monitor]
probe_timeout_ms = 2000
alert_cooldown_ms = 0

[cache]
backend = "moka"
operation_timeout_ms = 25

[services.payments]
strategy = "fallback_service"
max_consecutive_failures = 5
priority_level = "critical"

[services.notifications]
strategy = "offline_mode"
health_check_interval_ms = 60000
"#;

    #[test]
    fn test_from_toml_str() {
        let config = ConfigLoader::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.monitor.probe_timeout_ms, 2_000);
        assert_eq!(config.monitor.alert_cooldown_ms, 0);
        assert_eq!(config.monitor.slow_response_threshold_ms, 1_000);
        assert_eq!(config.cache.backend, CacheBackendKind::Moka);
        assert_eq!(config.cache.operation_timeout_ms, 25);

        let payments = &config.services["payments"];
        assert_eq!(payments.strategy, DegradationStrategy::FallbackService);
        assert_eq!(payments.max_consecutive_failures, 5);
        assert_eq!(payments.priority_level, PriorityLevel::Critical);
        assert_eq!(
            config.services["notifications"].health_check_interval_ms,
            60_000
        );
    }

    #[test]
    fn test_invalid_service_is_rejected() {
        let err = ConfigLoader::from_toml_str("[services.db]\nhealth_check_interval_ms = 10\n")
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidServiceConfig { .. }));
        assert!(err.to_string().contains("'db'"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let overrides = HashMap::from([
            (
                "RESILIENCE__MONITOR__PROBE_TIMEOUT_MS".to_string(),
                "750".to_string(),
            ),
            (
                "RESILIENCE__EXECUTOR__FALLBACK_TIMEOUT_MS".to_string(),
                "1500".to_string(),
            ),
        ]);

        let path = file.path().to_path_buf();
        let config = ConfigLoader::build(Some(path), ConfigLoader::environment(Some(overrides)))
            .unwrap();

        assert_eq!(config.monitor.probe_timeout_ms, 750);
        assert_eq!(config.executor.fallback_timeout_ms, 1_500);
        assert_eq!(config.cache.backend, CacheBackendKind::Moka);
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::load_from_path(Path::new("/nonexistent/resilience.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::FileNotFound(_)));
    }
}
