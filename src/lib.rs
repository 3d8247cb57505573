#![allow(clippy::doc_markdown)] // Allow technical terms like CacheService, JoinHandle in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Resilience Engine
//!
//! Runtime health tracking and graceful degradation for the services an
//! application depends on (database, cache, external APIs, notification
//! providers).
//!
//! ## Overview
//!
//! Each registered service gets a small state machine
//! (Healthy → Degraded → Unavailable → Recovering → Healthy) driven by periodic
//! health probes. Call sites wrap their work in
//! [`ResilienceEngine::execute_with_degradation`]; when a service is not healthy
//! and its [`DegradationStrategy`] allows it, the call is rerouted through a
//! priority-ordered chain of [`FallbackOperation`]s whose results can be cached.
//!
//! ## Module Organization
//!
//! - [`health`] - Probes, per-service state machine, scheduler and summary
//! - [`degradation`] - Policy resolution, fallback executor, metrics
//! - [`cache`] - Two-tier fallback result cache and external store backends
//! - [`alerts`] - Alert payloads and the dispatcher seam
//! - [`config`] - TOML / environment configuration
//! - [`engine`] - The `ResilienceEngine` handle tying it together
//! - [`error`] - Engine management errors
//! - [`logging`] - Structured logging bootstrap
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resilience_engine::{
//!     DegradationConfig, FnProbe, ResilienceEngine, ServiceRegistration,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! resilience_engine::logging::init_structured_logging();
//!
//! let engine = Arc::new(ResilienceEngine::builder().build()?);
//! engine.register_service(
//!     ServiceRegistration::new("database", DegradationConfig::for_database())
//!         .with_probe(Arc::new(FnProbe::new(|| async { Ok(()) }))),
//! )?;
//!
//! if !engine.is_available("database") {
//!     println!("database is down: {:?}", engine.get_health("database"));
//! }
//!
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod cache;
pub mod config;
pub mod degradation;
pub mod engine;
pub mod error;
pub mod health;
pub mod logging;

pub use alerts::{AlertDispatcher, AlertError, AlertPayload, AlertSeverity, LoggingAlertDispatcher};
pub use cache::{CacheError, CacheProvider, CacheService, ResultCache};
pub use config::{ConfigLoader, ConfigurationError, EngineConfig};
pub use degradation::{
    should_fallback, DegradationConfig, DegradationMetricsSnapshot, DegradationRecord,
    DegradationStrategy, ExecutionError, FallbackOperation, PriorityLevel,
};
pub use engine::{ResilienceEngine, ResilienceEngineBuilder, ServiceRegistration};
pub use error::{ResilienceError, ResilienceResult};
pub use health::{
    CheckStatus, CircuitBreaker, FnProbe, HealthCheckResult, HealthProbe, OverallStatus,
    ProbeError, ProbeOutcome, ServiceHealth, ServiceStatus, SystemHealthSummary, SystemMetrics,
};
