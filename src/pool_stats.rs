//! Derived pool utilization metrics
//!
//! Pure computation over gauges reported by the external pool. No breaker
//! or cache involvement; the caller collects the numbers, this module
//! classifies them.

use crate::status_cache::HealthLevel;
use serde::Serialize;

/// Utilization above this percentage is reported as unhealthy
pub const UTILIZATION_UNHEALTHY_PCT: f64 = 90.0;
/// Utilization above this percentage is reported as a warning
pub const UTILIZATION_WARNING_PCT: f64 = 70.0;

/// Point-in-time gauges from the external resource pool
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PoolGauges {
    /// Connections currently open
    pub total_count: u32,
    /// Open connections sitting idle
    pub idle_count: u32,
    /// Callers waiting for a connection
    pub waiting_count: u32,
    /// Configured pool capacity
    pub max_connections: u32,
}

impl PoolGauges {
    /// Busy connections as a percentage of configured capacity
    pub fn utilization_pct(&self) -> f64 {
        if self.max_connections == 0 {
            return 0.0;
        }
        let busy = self.total_count.saturating_sub(self.idle_count);
        busy as f64 / self.max_connections as f64 * 100.0
    }

    /// Classify utilization: > 90% unhealthy, > 70% warning, else healthy
    pub fn classify(&self) -> HealthLevel {
        let pct = self.utilization_pct();
        if pct > UTILIZATION_UNHEALTHY_PCT {
            HealthLevel::Unhealthy
        } else if pct > UTILIZATION_WARNING_PCT {
            HealthLevel::Warning
        } else {
            HealthLevel::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gauges(total: u32, idle: u32, max: u32) -> PoolGauges {
        PoolGauges {
            total_count: total,
            idle_count: idle,
            waiting_count: 0,
            max_connections: max,
        }
    }

    #[test]
    fn test_utilization_math() {
        assert_eq!(gauges(8, 3, 10).utilization_pct(), 50.0);
        assert_eq!(gauges(0, 0, 10).utilization_pct(), 0.0);
        // Zero capacity must not divide by zero
        assert_eq!(gauges(5, 0, 0).utilization_pct(), 0.0);
    }

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(gauges(7, 0, 10).classify(), HealthLevel::Healthy); // 70% exactly
        assert_eq!(gauges(8, 0, 10).classify(), HealthLevel::Warning); // 80%
        assert_eq!(gauges(9, 0, 10).classify(), HealthLevel::Warning); // 90% exactly
        assert_eq!(gauges(10, 0, 10).classify(), HealthLevel::Unhealthy); // 100%
    }

    #[test]
    fn test_idle_exceeding_total_saturates() {
        assert_eq!(gauges(2, 5, 10).utilization_pct(), 0.0);
    }
}
