//! Probabilistic request admission.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::backpressure::FULL_THROTTLING;
use crate::stats::ThrottlingStats;
use crate::utils::Counter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ThrottlerError {
    #[error("threshold value must belong to [0; 100], got {0}")]
    InvalidThreshold(u32),
}

/// Rejects approximately `threshold` percent of requests.
///
/// The coin is flipped with `fastrand`'s thread-local generator, so
/// concurrent callers never contend on a shared RNG state.
#[derive(Debug)]
pub struct Throttler {
    requests_total: Arc<Counter>,
    requests_passed: Counter,
    requests_throttled: Counter,
    /// Share of requests to reject, in `[0; 100]`.
    threshold: AtomicU32,
}

impl Throttler {
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    /// Creates a throttler whose total counter rolls up into `parent`.
    pub fn with_parent(parent: Option<Arc<Counter>>) -> Self {
        let requests_total = Arc::new(Counter::new(parent));
        Self {
            requests_passed: Counter::new(Some(requests_total.clone())),
            requests_throttled: Counter::new(Some(requests_total.clone())),
            requests_total,
            threshold: AtomicU32::new(0),
        }
    }

    pub fn set_threshold(&self, value: u32) -> Result<(), ThrottlerError> {
        if value > FULL_THROTTLING {
            return Err(ThrottlerError::InvalidThreshold(value));
        }

        self.threshold.store(value, Ordering::Relaxed);
        Ok(())
    }

    pub fn threshold(&self) -> u32 {
        self.threshold.load(Ordering::Relaxed)
    }

    pub fn allow(&self) -> bool {
        let threshold = self.threshold.load(Ordering::Relaxed);

        if threshold == 0 {
            self.requests_passed.inc(1);
            return true;
        }

        // Uniform draw in [0; 100): values below the threshold are rejected.
        let allowed = fastrand::u32(0..FULL_THROTTLING) >= threshold;

        if allowed {
            self.requests_passed.inc(1);
        } else {
            self.requests_throttled.inc(1);
        }

        allowed
    }

    /// Counter snapshot. `total` is derived from the other two so the snapshot
    /// stays self-consistent while admissions race with the read.
    pub fn stats(&self) -> ThrottlingStats {
        let passed = self.requests_passed.count();
        let throttled = self.requests_throttled.count();
        ThrottlingStats {
            passed,
            throttled,
            total: passed + throttled,
        }
    }

    /// Aggregate counter fed by both outcomes.
    pub fn requests_total(&self) -> &Arc<Counter> {
        &self.requests_total
    }
}

impl Default for Throttler {
    fn default() -> Self {
        Self::new()
    }
}
