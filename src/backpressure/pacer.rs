//! GC pacing platform seam.
//!
//! The control algorithm only produces a pacing target. Where the target
//! lands depends on the host: a collector knob, an arena trimming policy,
//! a cache eviction ratio. Hosts with nothing to pace keep the default
//! [`NoopGcPacer`] and rely on throttling alone.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use crate::backpressure::DEFAULT_GC_PERCENT;

/// Receives the GC pacing target chosen by the controller.
pub trait GcPacer: Send + Sync + Debug {
    /// Applies `value` and returns the previous target.
    fn set_gc_percent(&self, value: i32) -> i32;
}

/// Discards the target. Throttling becomes the only enforcement mechanism.
#[derive(Debug)]
pub struct NoopGcPacer {
    value: AtomicI32,
}

impl NoopGcPacer {
    pub fn new() -> Self {
        Self {
            value: AtomicI32::new(DEFAULT_GC_PERCENT),
        }
    }
}

impl Default for NoopGcPacer {
    fn default() -> Self {
        Self::new()
    }
}

impl GcPacer for NoopGcPacer {
    fn set_gc_percent(&self, value: i32) -> i32 {
        tracing::debug!(gc_percent = value, "No GC pacing knob available, ignoring target");
        self.value.swap(value, Ordering::Relaxed)
    }
}

/// Stores the pacing target so the host can read it on its own schedule.
#[derive(Debug)]
pub struct AtomicGcPacer {
    value: AtomicI32,
    applications: AtomicU64,
}

impl AtomicGcPacer {
    pub fn new() -> Self {
        Self {
            value: AtomicI32::new(DEFAULT_GC_PERCENT),
            applications: AtomicU64::new(0),
        }
    }

    pub fn current(&self) -> i32 {
        self.value.load(Ordering::Relaxed)
    }

    /// How many times a target has been applied.
    pub fn applications(&self) -> u64 {
        self.applications.load(Ordering::Relaxed)
    }
}

impl Default for AtomicGcPacer {
    fn default() -> Self {
        Self::new()
    }
}

impl GcPacer for AtomicGcPacer {
    fn set_gc_percent(&self, value: i32) -> i32 {
        self.applications.fetch_add(1, Ordering::Relaxed);
        self.value.swap(value, Ordering::Relaxed)
    }
}
