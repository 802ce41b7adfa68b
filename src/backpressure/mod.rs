//! Backpressure subsystem: applies control signals to the process.
//!
//! # Data Flow
//! ```text
//! Controller loop (once per period):
//!     → operator.rs (set_control_parameters, dedup against last value)
//!     → throttler.rs (threshold for request admission)
//!     → pacer.rs (GC pacing target)
//!     → notification channel (best effort)
//!
//! Request path (any thread):
//!     middleware → operator.allow_request() → throttler.allow()
//! ```
//!
//! # Design Decisions
//! - Admission is lock-free and allocation-free: atomics + thread-local RNG
//! - Threshold changes are advisory; in-flight requests may see the old value
//! - Notifications never block the control loop

pub mod operator;
pub mod pacer;
pub mod throttler;

pub use operator::OperatorImpl;
pub use pacer::{AtomicGcPacer, GcPacer, NoopGcPacer};
pub use throttler::{Throttler, ThrottlerError};

use crate::stats::{BackpressureStats, ControlParameters};

/// GC pacing value used outside the danger zone.
pub const DEFAULT_GC_PERCENT: i32 = 100;
/// Admit every request.
pub const NO_THROTTLING: u32 = 0;
/// Reject every request.
pub const FULL_THROTTLING: u32 = 100;

/// Error type for the backpressure operator.
#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    #[error("throttler set threshold")]
    Throttler(#[source] ThrottlerError),
}

/// Applies control signals to the runtime and to the request path.
pub trait Operator: Send + Sync {
    /// Registers the actual value of control parameters.
    fn set_control_parameters(&self, value: ControlParameters) -> Result<(), OperatorError>;

    /// Decides whether the current request may be executed.
    fn allow_request(&self) -> bool;

    fn get_stats(&self) -> Result<BackpressureStats, OperatorError>;
}
