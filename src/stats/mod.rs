//! Statistics and telemetry subsystem.
//!
//! # Data Flow
//! ```text
//! Telemetry (service.rs, subscription.rs):
//!     process sampler / host code
//!     → MemorySnapshot stream
//!     → controller loop
//!
//! Reporting (memlimiter.rs):
//!     controller + backpressure operator
//!     → ControllerStats / BackpressureStats
//!     → MemLimiterStats (pull via get_stats, push via notifications)
//! ```
//!
//! # Design Decisions
//! - Snapshots are plain values; no shared mutable state crosses the boundary
//! - All report types serialize to JSON for export

pub mod memlimiter;
pub mod service;
pub mod subscription;

pub use memlimiter::{
    BackpressureStats, ControlParameters, ControllerNextGcStats, ControllerStats,
    MemLimiterStats, MemoryBudgetStats, SpecialConsumersStats, ThrottlingStats,
};
pub use service::{ConsumptionReport, ConsumptionReporter, MemorySnapshot, ServiceStatsSubscription};
pub use subscription::{ChannelSubscription, SubscriptionDefault};
