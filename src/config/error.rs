//! Configuration Error Types

use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Configuration file not found at the given path
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// File or environment source could not be parsed
    #[error("Parse error for {source_name}: {reason}")]
    ParseError { source_name: String, reason: String },

    /// Configuration validation errors
    #[error("Configuration validation failed: {error}")]
    ValidationError { error: String },

    /// One `[services.<name>]` table failed validation
    #[error("Invalid configuration for service '{service}': {error}")]
    InvalidServiceConfig { service: String, error: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigurationError {
    pub fn parse_error<S: Into<String>, E: std::fmt::Display>(source_name: S, error: E) -> Self {
        Self::ParseError {
            source_name: source_name.into(),
            reason: error.to_string(),
        }
    }

    pub fn validation_error<E: std::fmt::Display>(error: E) -> Self {
        Self::ValidationError {
            error: error.to_string(),
        }
    }

    pub fn invalid_service_config<S: Into<String>, E: std::fmt::Display>(
        service: S,
        error: E,
    ) -> Self {
        Self::InvalidServiceConfig {
            service: service.into(),
            error: error.to_string(),
        }
    }

    pub fn invalid_value<F: Into<String>, V: Into<String>, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        match error {
            config::ConfigError::NotFound(path) => Self::FileNotFound(path),
            other => Self::parse_error("configuration sources", other),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigurationError>;
