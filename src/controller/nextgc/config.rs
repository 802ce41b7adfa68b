//! NextGC controller configuration.

use std::time::Duration;

use bytesize::ByteSize;
use serde::{Deserialize, Serialize};

use crate::config::validation::{ValidationError, Validator};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Physical memory (RSS) hard limit for the process.
    pub rss_limit: ByteSize,

    /// Budget utilization [percent] at which GC pacing becomes more conservative.
    /// Must belong to `(0; 100]`.
    pub danger_zone_gogc: u32,

    /// Budget utilization [percent] at which request throttling starts.
    /// Must belong to `(0; 100]`.
    pub danger_zone_throttling: u32,

    /// How often control parameters are pushed to the operator.
    #[serde(with = "crate::config::units::duration")]
    pub period: Duration,

    pub component_proportional: ComponentProportionalConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ComponentProportionalConfig {
    pub coefficient: f64,

    /// EMA window. Zero disables smoothing.
    #[serde(default)]
    pub window_size: u32,
}

impl ControllerConfig {
    /// Checks value ranges, collecting every violation.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut validator = Validator::new("controller_nextgc");
        self.check(&mut validator);
        validator.finish()
    }

    pub(crate) fn check(&self, v: &mut Validator) {
        if self.rss_limit.as_u64() == 0 {
            v.error("rss_limit", "must be greater than zero");
        }
        if self.danger_zone_gogc == 0 || self.danger_zone_gogc > 100 {
            v.error("danger_zone_gogc", "must belong to (0; 100]");
        }
        if self.danger_zone_throttling == 0 || self.danger_zone_throttling > 100 {
            v.error("danger_zone_throttling", "must belong to (0; 100]");
        }
        if self.period.is_zero() {
            v.error("period", "must be greater than zero");
        }
        self.component_proportional.check(v);
    }
}

impl ComponentProportionalConfig {
    pub(crate) fn check(&self, v: &mut Validator) {
        if self.coefficient == 0.0 {
            v.error("component_proportional.coefficient", "zero coefficient makes no sense");
        } else if !self.coefficient.is_finite() {
            v.error("component_proportional.coefficient", "must be finite");
        }
    }
}
