//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Controller loop, operator, middleware:
//!     → tracing macros (structured fields)
//!     → metrics.rs (counters, gauges)
//!
//! Binary bootstrap:
//!     → logging.rs (subscriber with env filter)
//!     → metrics.rs (Prometheus exporter)
//! ```
//!
//! # Design Decisions
//! - Library code only emits events; installing subscribers/recorders is up to the binary
//! - Metrics go through the `metrics` facade and are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
