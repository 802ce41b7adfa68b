//! Proportional component.
//!
//! The law is hyperbolic rather than linear: the output grows without bound
//! as utilization approaches the budget, so the signal gets much stronger
//! near the limit.

use crate::controller::nextgc::config::ComponentProportionalConfig;
use crate::controller::nextgc::smoothing::{self, Smoothing};
use crate::controller::ControllerError;

/// Output reported when usage reaches or exceeds the budget.
pub const MAX_REASONABLE_OUTPUT: f64 = 100.0;

#[derive(Debug)]
pub struct ComponentP {
    coefficient: f64,
    smoothing: Box<dyn Smoothing>,
}

impl ComponentP {
    pub fn new(cfg: &ComponentProportionalConfig) -> Self {
        Self::with_smoothing(cfg.coefficient, smoothing::from_window(cfg.window_size))
    }

    pub fn with_smoothing(coefficient: f64, smoothing: Box<dyn Smoothing>) -> Self {
        Self {
            coefficient,
            smoothing,
        }
    }

    /// Computes the (possibly smoothed) output for `utilization`.
    pub fn value(&mut self, utilization: f64) -> Result<f64, ControllerError> {
        let raw = self.value_raw(utilization)?;
        Ok(self.smoothing.update(raw))
    }

    fn value_raw(&self, utilization: f64) -> Result<f64, ControllerError> {
        if utilization.is_nan() || utilization < 0.0 {
            return Err(ControllerError::Utilization(utilization));
        }

        if utilization >= 1.0 {
            // Small overshoots (< 1.1) do happen in practice.
            tracing::warn!(
                utilization,
                output = MAX_REASONABLE_OUTPUT,
                "Memory usage exceeds the budget, cutting output value"
            );
            return Ok(MAX_REASONABLE_OUTPUT);
        }

        Ok(self.coefficient * (1.0 / (1.0 - utilization)))
    }
}
