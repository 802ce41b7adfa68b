//! Memory limiter for long-running services.
//!
//! Observes process memory telemetry, computes a control signal with a
//! non-linear proportional law and applies it as a GC pacing target and a
//! probabilistic request throttling percentage, keeping RSS below a hard
//! limit without manual intervention.

pub mod allocator;
pub mod backpressure;
pub mod breaker;
pub mod config;
pub mod controller;
pub mod middleware;
pub mod observability;
pub mod service;
pub mod stats;
pub mod utils;

pub use backpressure::{Operator, OperatorImpl};
pub use breaker::Breaker;
pub use config::MemLimiterConfig;
pub use controller::Controller;
pub use middleware::Middleware;
pub use service::{new_service_from_config, Service, ServiceError, ServiceOptions};
