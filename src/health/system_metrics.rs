//! Host resource sampling for the system health summary.

use parking_lot::Mutex;
use sysinfo::{Disks, System};
use tracing::debug;

use super::types::SystemMetrics;

/// Samples memory, global CPU and disk utilisation with `sysinfo`
///
/// CPU usage is a delta between refreshes, so the first sample after
/// construction may read 0.
pub struct SystemMetricsSampler {
    enabled: bool,
    system: Mutex<System>,
}

impl std::fmt::Debug for SystemMetricsSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemMetricsSampler")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl SystemMetricsSampler {
    pub fn new(enabled: bool) -> Self {
        let mut system = System::new();
        if enabled {
            system.refresh_memory();
            system.refresh_cpu_usage();
        }
        Self {
            enabled,
            system: Mutex::new(system),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Zeros when disabled
    pub fn sample(&self) -> SystemMetrics {
        if !self.enabled {
            return SystemMetrics::default();
        }

        let (memory_usage_percent, cpu_usage_percent) = {
            let mut system = self.system.lock();
            system.refresh_memory();
            system.refresh_cpu_usage();
            (
                percent(system.used_memory(), system.total_memory()),
                f64::from(system.global_cpu_usage()).clamp(0.0, 100.0),
            )
        };

        let disks = Disks::new_with_refreshed_list();
        let (total, available) = disks.list().iter().fold((0u64, 0u64), |(t, a), disk| {
            (
                t.saturating_add(disk.total_space()),
                a.saturating_add(disk.available_space()),
            )
        });
        let disk_usage_percent = percent(total.saturating_sub(available), total);

        let metrics = SystemMetrics {
            memory_usage_percent,
            cpu_usage_percent,
            disk_usage_percent,
        };
        debug!(
            memory_percent = metrics.memory_usage_percent,
            cpu_percent = metrics.cpu_usage_percent,
            disk_percent = metrics.disk_usage_percent,
            "Sampled system metrics"
        );
        metrics
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}
