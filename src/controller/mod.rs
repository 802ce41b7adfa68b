//! Memory budget controllers.
//!
//! # Data Flow
//! ```text
//! ServiceStatsSubscription (MemorySnapshot stream)
//!     → nextgc::ControllerImpl (single-writer loop)
//!         ├─ telemetry → budget, utilization, component outputs
//!         ├─ tick      → Operator::set_control_parameters
//!         └─ get_stats → oneshot reply
//!     → ApplicationTerminator on fatal errors
//! ```
//!
//! # Design Decisions
//! - All controller state lives inside one task; callers talk to it through channels
//! - Runtime failures are fatal and never retried
//! - Only the proportional term exists; new terms plug in next to it in `nextgc`

pub mod error;
pub mod nextgc;

pub use error::ControllerError;

use async_trait::async_trait;

use crate::stats::ControllerStats;

/// Generates control parameters for the backpressure operator.
#[async_trait]
pub trait Controller: Send + Sync {
    async fn get_stats(&self) -> Result<ControllerStats, ControllerError>;

    /// Stops the control loop and waits for it to exit.
    async fn quit(&self);
}
