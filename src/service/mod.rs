//! Memory limiter facade.
//!
//! # Data Flow
//! ```text
//! new_service_from_config(config, terminator, subscription, options)
//!     config == None → stub.rs (telemetry only, admits everything)
//!     otherwise      → implementation.rs
//!                          ├─ OperatorImpl (or caller-provided operator)
//!                          ├─ NextGC controller
//!                          └─ Middleware around the host's routers
//! ```
//!
//! # Design Decisions
//! - The host owns the telemetry subscription; the service quits it last
//! - Shutdown order is controller first, then subscription

pub mod implementation;
pub mod stub;

pub use implementation::ServiceImpl;
pub use stub::ServiceStub;

use std::sync::Arc;

use async_trait::async_trait;

use crate::backpressure::{Operator, OperatorError, OperatorImpl};
use crate::config::schema::MemLimiterConfig;
use crate::config::validation::ValidationError;
use crate::controller::nextgc::new_controller_from_config;
use crate::controller::ControllerError;
use crate::middleware::Middleware;
use crate::stats::{ConsumptionReporter, MemLimiterStats, ServiceStatsSubscription};
use crate::utils::ApplicationTerminator;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid memlimiter configuration: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Config(Vec<ValidationError>),

    #[error("controller: {0}")]
    Controller(#[from] ControllerError),

    #[error("backpressure: {0}")]
    Backpressure(#[from] OperatorError),
}

/// Memory limiter as seen by the host application.
#[async_trait]
pub trait Service: Send + Sync {
    /// Admission control for the host's routers.
    fn middleware(&self) -> &Middleware;

    async fn get_stats(&self) -> Result<MemLimiterStats, ServiceError>;

    /// Stops every background task, including the telemetry subscription.
    async fn quit(&self);
}

/// Optional collaborators for [`new_service_from_config`].
#[derive(Default, Clone)]
pub struct ServiceOptions {
    /// Replaces the default [`OperatorImpl`].
    pub backpressure_operator: Option<Arc<dyn Operator>>,
    pub consumption_reporter: Option<Arc<dyn ConsumptionReporter>>,
}

impl ServiceOptions {
    pub fn with_backpressure_operator(mut self, operator: Arc<dyn Operator>) -> Self {
        self.backpressure_operator = Some(operator);
        self
    }

    pub fn with_consumption_reporter(mut self, reporter: Arc<dyn ConsumptionReporter>) -> Self {
        self.consumption_reporter = Some(reporter);
        self
    }
}

/// Builds the memory limiter. Must be called from within a Tokio runtime.
pub fn new_service_from_config(
    config: Option<&MemLimiterConfig>,
    terminator: Arc<dyn ApplicationTerminator>,
    subscription: Arc<dyn ServiceStatsSubscription>,
    options: ServiceOptions,
) -> Result<Arc<dyn Service>, ServiceError> {
    let Some(config) = config else {
        tracing::info!("No memlimiter configuration, running without memory control");
        return Ok(Arc::new(ServiceStub::new(subscription)));
    };

    let Some(controller_config) = &config.controller_nextgc else {
        return Err(ServiceError::Config(vec![ValidationError::new(
            "controller_nextgc",
            "section is required",
        )]));
    };

    let operator = options
        .backpressure_operator
        .unwrap_or_else(|| Arc::new(OperatorImpl::new()) as Arc<dyn Operator>);

    let controller = new_controller_from_config(
        controller_config,
        subscription.as_ref(),
        options.consumption_reporter,
        operator.clone(),
        terminator,
    )?;

    Ok(Arc::new(ServiceImpl::new(controller, operator, subscription)))
}
