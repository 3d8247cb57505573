//! Proptest strategies for health state machine inputs.

use proptest::prelude::*;
use resilience_engine::{DegradationConfig, DegradationStrategy};

/// `max_consecutive_failures` in a realistic range
pub fn max_failures_strategy() -> impl Strategy<Value = u32> {
    1u32..=12
}

pub fn recovery_threshold_strategy() -> impl Strategy<Value = u32> {
    1u32..=8
}

/// Probe results, `true` for a healthy probe
pub fn probe_sequence_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 0..60)
}

pub fn strategy_strategy() -> impl Strategy<Value = DegradationStrategy> {
    prop_oneof![
        Just(DegradationStrategy::FailFast),
        Just(DegradationStrategy::CachedResponse),
        Just(DegradationStrategy::SimplifiedResponse),
        Just(DegradationStrategy::FallbackService),
        Just(DegradationStrategy::OfflineMode),
        Just(DegradationStrategy::RetryWithBackoff),
    ]
}

pub fn degradation_config_strategy() -> impl Strategy<Value = DegradationConfig> {
    (
        strategy_strategy(),
        max_failures_strategy(),
        recovery_threshold_strategy(),
        0u32..10,
    )
        .prop_map(
            |(strategy, max_consecutive_failures, recovery_threshold, retry_count)| {
                DegradationConfig {
                    strategy,
                    max_consecutive_failures,
                    recovery_threshold,
                    retry_count,
                    ..Default::default()
                }
            },
        )
}
