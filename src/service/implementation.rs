use std::sync::Arc;

use async_trait::async_trait;

use crate::backpressure::Operator;
use crate::controller::nextgc::ControllerImpl;
use crate::controller::Controller;
use crate::middleware::Middleware;
use crate::service::{Service, ServiceError};
use crate::stats::{MemLimiterStats, ServiceStatsSubscription};

/// Service with an active NextGC controller.
pub struct ServiceImpl {
    middleware: Middleware,
    operator: Arc<dyn Operator>,
    subscription: Arc<dyn ServiceStatsSubscription>,
    controller: ControllerImpl,
}

impl ServiceImpl {
    pub(crate) fn new(
        controller: ControllerImpl,
        operator: Arc<dyn Operator>,
        subscription: Arc<dyn ServiceStatsSubscription>,
    ) -> Self {
        Self {
            middleware: Middleware::new(operator.clone()),
            operator,
            subscription,
            controller,
        }
    }
}

#[async_trait]
impl Service for ServiceImpl {
    fn middleware(&self) -> &Middleware {
        &self.middleware
    }

    async fn get_stats(&self) -> Result<MemLimiterStats, ServiceError> {
        let controller = self.controller.get_stats().await?;
        let backpressure = self.operator.get_stats()?;

        Ok(MemLimiterStats {
            controller: Some(controller),
            backpressure: Some(backpressure),
        })
    }

    async fn quit(&self) {
        self.controller.quit().await;
        self.subscription.quit().await;
    }
}
