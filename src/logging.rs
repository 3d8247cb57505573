//! # Structured Logging Module
//!
//! Environment-aware structured logging for embedders that don't install their
//! own `tracing` subscriber.
//!
//! - Level derives from `RESILIENCE_ENV` (test/development → debug, production → info)
//! - `RUST_LOG` overrides the derived level when set
//! - `RESILIENCE_LOG_FORMAT=json` switches console output to JSON lines

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = build_filter(&environment);
        let json = std::env::var("RESILIENCE_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let console_layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .boxed()
        };

        // A global subscriber may already be installed by the host application
        if tracing_subscriber::registry()
            .with(console_layer.with_filter(filter))
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("RESILIENCE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn build_filter(environment: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(get_log_level(environment)))
}

/// Log structured data for service lifecycle operations (register, force, shutdown)
pub fn log_service_operation(operation: &str, service: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        service = %service,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 SERVICE_OPERATION"
    );
}
