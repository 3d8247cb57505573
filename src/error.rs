//! Error types for the resilience engine.
//!
//! Only two failures ever reach a caller of
//! [`execute_with_degradation`](crate::ResilienceEngine::execute_with_degradation):
//! the primary operation's own error while the service is healthy, and an exhausted
//! fallback chain. Those live in [`ExecutionError`](crate::degradation::ExecutionError).
//! Everything here covers engine management (registration, configuration, lifecycle).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResilienceError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Invalid configuration for service '{service}': {reason}")]
    InvalidServiceConfig { service: String, reason: String },
    #[error("Service '{0}' is already registered")]
    DuplicateService(String),
    #[error("Service '{0}' is not registered")]
    UnknownService(String),
    #[error("Engine has been shut down")]
    ShutDown,
}

impl From<crate::config::ConfigurationError> for ResilienceError {
    fn from(error: crate::config::ConfigurationError) -> Self {
        ResilienceError::ConfigurationError(error.to_string())
    }
}

pub type ResilienceResult<T> = std::result::Result<T, ResilienceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationError;

    #[test]
    fn test_configuration_error_converts() {
        let err: ResilienceError =
            ConfigurationError::validation_error("interval out of range").into();
        assert!(matches!(err, ResilienceError::ConfigurationError(ref msg) if msg.contains("interval out of range")));
    }
}
