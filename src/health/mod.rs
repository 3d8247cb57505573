//! # Health Monitoring
//!
//! Per-service state machines, the probes that drive them and the scheduler that
//! aggregates their results into a system-wide summary.
//!
//! ## Module Structure
//!
//! - `types`: status enums, health records and the summary
//! - `probe`: `HealthProbe` / `CircuitBreaker` seams and adapters
//! - `tracker`: the per-service state machine
//! - `history`: bounded per-service check history
//! - `registry`: name → service entry map shared with the executor
//! - `system_metrics`: host memory/CPU/disk sampling
//! - `scheduler`: periodic probing, summary publication and alerting

pub mod history;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod system_metrics;
pub mod tracker;
pub mod types;

pub use probe::{CacheHealthProbe, CircuitBreaker, FnProbe, HealthProbe, ProbeError, ProbeOutcome};
pub use registry::{ServiceEntry, ServiceRegistry};
pub use scheduler::{HealthMonitorScheduler, SYSTEM_SUMMARY_KEY};
pub use system_metrics::SystemMetricsSampler;
pub use tracker::{ServiceHealthTracker, TransitionOutcome};
pub use types::{
    CheckStatus, HealthCheckResult, OverallStatus, ServiceHealth, ServiceStatus,
    SystemHealthSummary, SystemMetrics,
};
