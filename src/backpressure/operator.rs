//! Default backpressure operator.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::backpressure::{GcPacer, NoopGcPacer, Operator, OperatorError, Throttler};
use crate::stats::{BackpressureStats, ControlParameters, MemLimiterStats};

/// Applies control parameters to a [`Throttler`] and a [`GcPacer`].
///
/// `set_control_parameters` is expected to be driven by a single writer
/// (the controller loop); readers on the request path only touch atomics.
pub struct OperatorImpl {
    throttler: Throttler,
    pacer: Arc<dyn GcPacer>,
    notifications: Option<mpsc::Sender<MemLimiterStats>>,
    last_control_parameters: ArcSwapOption<ControlParameters>,
}

impl OperatorImpl {
    pub fn new() -> Self {
        Self {
            throttler: Throttler::new(),
            pacer: Arc::new(NoopGcPacer::new()),
            notifications: None,
            last_control_parameters: ArcSwapOption::empty(),
        }
    }

    /// Publishes aggregated stats on every applied change.
    ///
    /// Lets the host implement its own backpressure on top of the controller's
    /// telemetry. Updates are dropped while the receiver is not ready.
    pub fn with_notifications(mut self, tx: mpsc::Sender<MemLimiterStats>) -> Self {
        self.notifications = Some(tx);
        self
    }

    pub fn with_gc_pacer(mut self, pacer: Arc<dyn GcPacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_throttler(mut self, throttler: Throttler) -> Self {
        self.throttler = throttler;
        self
    }

    fn notify(&self, value: &ControlParameters) -> Result<(), OperatorError> {
        let Some(tx) = &self.notifications else {
            return Ok(());
        };

        let stats = MemLimiterStats {
            controller: value.controller_stats.as_deref().cloned(),
            backpressure: Some(self.get_stats()?),
        };

        match tx.try_send(stats) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!("Notification receiver not ready, dropping stats update");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Notification receiver closed, dropping stats update");
            }
        }

        Ok(())
    }
}

impl Default for OperatorImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for OperatorImpl {
    fn set_control_parameters(&self, value: ControlParameters) -> Result<(), OperatorError> {
        if let Some(last) = self.last_control_parameters.load().as_deref() {
            if *last == value {
                return Ok(());
            }
        }

        self.throttler
            .set_threshold(value.throttling_percentage)
            .map_err(OperatorError::Throttler)?;

        let previous_gc_percent = self.pacer.set_gc_percent(value.gc_percent);

        tracing::info!(
            gc_percent = value.gc_percent,
            previous_gc_percent,
            throttling_percentage = value.throttling_percentage,
            "Control parameters changed"
        );
        crate::observability::metrics::record_control_parameters(&value);

        let value = Arc::new(value);
        self.last_control_parameters.store(Some(value.clone()));

        self.notify(&value)
    }

    fn allow_request(&self) -> bool {
        self.throttler.allow()
    }

    fn get_stats(&self) -> Result<BackpressureStats, OperatorError> {
        Ok(BackpressureStats {
            throttling: self.throttler.stats(),
            control_parameters: self.last_control_parameters.load_full().map(|p| (*p).clone()),
        })
    }
}
