//! # Degradation
//!
//! Policy resolution, the fallback executor and the counters they feed.

pub mod executor;
pub mod metrics;
pub mod policy;

pub use executor::{ExecutionError, FallbackExecutor, FallbackOperation};
pub use metrics::{DegradationMetrics, DegradationMetricsSnapshot, DegradationRecord};
pub use policy::{should_fallback, DegradationConfig, DegradationStrategy, PriorityLevel};
