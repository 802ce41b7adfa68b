use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::breaker::{Breaker, BreakerGuard};
use crate::middleware::Middleware;
use crate::service::{Service, ServiceError};
use crate::stats::{ControllerStats, MemLimiterStats, MemoryBudgetStats, MemorySnapshot, ServiceStatsSubscription};

/// Service without memory control.
///
/// Keeps draining telemetry so that the latest RSS shows up in stats.
pub struct ServiceStub {
    middleware: Middleware,
    latest: Arc<ArcSwapOption<MemorySnapshot>>,
    subscription: Arc<dyn ServiceStatsSubscription>,
    breaker: Arc<Breaker>,
}

impl ServiceStub {
    pub fn new(subscription: Arc<dyn ServiceStatsSubscription>) -> Self {
        let latest = Arc::new(ArcSwapOption::empty());

        let breaker = match subscription.updates() {
            Some(updates) => {
                let breaker = Arc::new(Breaker::with_init_value(1));
                tokio::spawn(drain(breaker.clone(), updates, latest.clone()));
                breaker
            }
            None => {
                tracing::warn!("Telemetry stream already taken, stats will stay empty");
                Arc::new(Breaker::new())
            }
        };

        Self {
            middleware: Middleware::passthrough(),
            latest,
            subscription,
            breaker,
        }
    }
}

async fn drain(
    breaker: Arc<Breaker>,
    mut updates: mpsc::Receiver<MemorySnapshot>,
    latest: Arc<ArcSwapOption<MemorySnapshot>>,
) {
    let _guard = BreakerGuard::adopt(breaker.clone());

    loop {
        tokio::select! {
            snapshot = updates.recv() => match snapshot {
                Some(snapshot) => latest.store(Some(Arc::new(snapshot))),
                None => return,
            },
            _ = breaker.done() => return,
        }
    }
}

#[async_trait]
impl Service for ServiceStub {
    fn middleware(&self) -> &Middleware {
        &self.middleware
    }

    async fn get_stats(&self) -> Result<MemLimiterStats, ServiceError> {
        let Some(snapshot) = self.latest.load_full() else {
            return Ok(MemLimiterStats::default());
        };

        Ok(MemLimiterStats {
            controller: Some(ControllerStats {
                memory_budget: MemoryBudgetStats {
                    rss_actual: snapshot.rss.unwrap_or_default(),
                    ..Default::default()
                },
                ..Default::default()
            }),
            backpressure: None,
        })
    }

    async fn quit(&self) {
        self.breaker.shutdown_and_wait_async().await;
        self.subscription.quit().await;
    }
}

impl Drop for ServiceStub {
    fn drop(&mut self) {
        self.breaker.shutdown();
    }
}
