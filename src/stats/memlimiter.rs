//! Report types exposed by the memory limiter.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::backpressure::{DEFAULT_GC_PERCENT, NO_THROTTLING};

/// Top-level statistics: controller state plus backpressure state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemLimiterStats {
    pub controller: Option<ControllerStats>,
    pub backpressure: Option<BackpressureStats>,
}

/// Memory budget controller statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControllerStats {
    pub memory_budget: MemoryBudgetStats,
    pub nextgc: ControllerNextGcStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryBudgetStats {
    /// Consumers reported by the host (caches, pools, foreign allocations).
    pub special_consumers: Option<SpecialConsumersStats>,
    /// Last observed resident set size [bytes].
    pub rss_actual: u64,
    /// Physical memory hard limit [bytes].
    pub rss_limit: u64,
    /// Memory left for the managed allocator once unmanaged consumers are
    /// subtracted from the hard limit [bytes].
    pub allocation_budget: u64,
    /// Projected next-collection size relative to the allocation budget.
    pub utilization: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpecialConsumersStats {
    pub managed: BTreeMap<String, u64>,
    pub unmanaged: BTreeMap<String, u64>,
}

/// Outputs of the NextGC controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControllerNextGcStats {
    /// Proportional component output (smoothed if enabled).
    pub p: f64,
    /// Final, saturated output.
    pub output: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackpressureStats {
    pub throttling: ThrottlingStats,
    /// Control signal most recently applied.
    pub control_parameters: Option<ControlParameters>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThrottlingStats {
    pub passed: u64,
    pub throttled: u64,
    /// Always `passed + throttled`.
    pub total: u64,
}

/// Control signal issued by the controller once per period.
///
/// Equality only looks at the two control values; the attached controller
/// snapshot is informational.
#[derive(Debug, Clone, Serialize)]
pub struct ControlParameters {
    /// GC pacing target (percent of heap growth before the next collection).
    pub gc_percent: i32,
    /// Share of requests to reject, in `[0; 100]`.
    pub throttling_percentage: u32,
    #[serde(skip)]
    pub controller_stats: Option<Box<ControllerStats>>,
}

impl ControlParameters {
    pub fn new(gc_percent: i32, throttling_percentage: u32) -> Self {
        Self {
            gc_percent,
            throttling_percentage,
            controller_stats: None,
        }
    }

    pub fn with_controller_stats(mut self, stats: ControllerStats) -> Self {
        self.controller_stats = Some(Box::new(stats));
        self
    }
}

impl Default for ControlParameters {
    fn default() -> Self {
        Self::new(DEFAULT_GC_PERCENT, NO_THROTTLING)
    }
}

impl PartialEq for ControlParameters {
    fn eq(&self, other: &Self) -> bool {
        self.gc_percent == other.gc_percent
            && self.throttling_percentage == other.throttling_percentage
    }
}

impl Eq for ControlParameters {}

impl fmt::Display for ControlParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gc_percent = {}, throttling_percentage = {}",
            self.gc_percent, self.throttling_percentage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_parameters_equality_ignores_stats() {
        let plain = ControlParameters::new(80, 20);
        let annotated = ControlParameters::new(80, 20).with_controller_stats(ControllerStats::default());

        assert_eq!(plain, annotated);
        assert_ne!(plain, ControlParameters::new(80, 21));
        assert_eq!(ControlParameters::default(), ControlParameters::new(100, 0));
        assert_eq!(plain.to_string(), "gc_percent = 80, throttling_percentage = 20");
    }

    #[test]
    fn test_stats_serialize_to_json() {
        let stats = MemLimiterStats {
            controller: None,
            backpressure: Some(BackpressureStats {
                throttling: ThrottlingStats { passed: 3, throttled: 1, total: 4 },
                control_parameters: Some(ControlParameters::new(90, 10)),
            }),
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["backpressure"]["throttling"]["total"], 4);
        assert_eq!(json["backpressure"]["control_parameters"]["gc_percent"], 90);
        assert!(json["backpressure"]["control_parameters"].get("controller_stats").is_none());
    }
}
