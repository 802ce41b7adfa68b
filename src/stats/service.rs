//! Telemetry consumed by the controller.
//!
//! The host process (or [`SubscriptionDefault`](super::SubscriptionDefault))
//! publishes a [`MemorySnapshot`] on every sampling tick. Services with large
//! caches, memory pools or allocations outside the managed allocator should
//! also provide a [`ConsumptionReporter`], since those consumers shrink the
//! budget left for everything else.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::utils::BoxError;

/// Memory consumption of long-lived predefined structures [bytes per key].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumptionReport {
    /// Structures living in memory owned by the managed allocator.
    pub managed: HashMap<String, u64>,
    /// Structures living beyond the managed allocator's visibility.
    pub unmanaged: HashMap<String, u64>,
}

impl ConsumptionReport {
    pub fn unmanaged_total(&self) -> u64 {
        self.unmanaged
            .values()
            .fold(0u64, |acc, value| acc.saturating_add(*value))
    }
}

/// One telemetry sample describing the process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySnapshot {
    /// Projected heap size at which the next collection happens [bytes].
    pub next_gc: u64,
    /// Resident set size, if the sampler could read it [bytes].
    pub rss: Option<u64>,
    pub consumption_report: Option<ConsumptionReport>,
}

/// Reports memory held by predefined consumers.
///
/// Queried by the controller once per telemetry sample.
pub trait ConsumptionReporter: Send + Sync {
    fn predefined_consumers(&self) -> Result<Option<ConsumptionReport>, BoxError>;
}

/// Source of the telemetry stream.
#[async_trait]
pub trait ServiceStatsSubscription: Send + Sync {
    /// Hands out the receiving side of the stream.
    ///
    /// There is a single consumer; subsequent calls return `None`.
    fn updates(&self) -> Option<mpsc::Receiver<MemorySnapshot>>;

    /// Stops producing samples and waits for the producer to finish.
    async fn quit(&self);
}
