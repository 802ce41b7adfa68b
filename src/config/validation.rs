//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (percentages, non-zero limits and periods)
//! - Validate addresses and log levels of the demo server
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{AllocatorConfig, MemLimiterConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Accumulates violations under a common field prefix.
#[derive(Debug, Default)]
pub struct Validator {
    prefix: String,
    errors: Vec<ValidationError>,
}

impl Validator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            errors: Vec::new(),
        }
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        let field = if self.prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", self.prefix, field)
        };
        self.errors.push(ValidationError::new(field, message));
    }

    /// Runs `f` with `prefix` appended to the current one.
    pub fn nested(&mut self, prefix: &str, f: impl FnOnce(&mut Validator)) {
        let saved = self.prefix.clone();
        self.prefix = if saved.is_empty() {
            prefix.to_string()
        } else {
            format!("{saved}.{prefix}")
        };
        f(self);
        self.prefix = saved;
    }

    pub fn finish(self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Validates the memory limiter section.
///
/// A missing controller is only an error when `controller_required` is set.
pub fn validate_memlimiter_config(
    config: &MemLimiterConfig,
    controller_required: bool,
) -> Result<(), Vec<ValidationError>> {
    let mut v = Validator::default();
    check_memlimiter(config, controller_required, &mut v);
    v.finish()
}

fn check_memlimiter(config: &MemLimiterConfig, controller_required: bool, v: &mut Validator) {
    match &config.controller_nextgc {
        Some(controller) => v.nested("controller_nextgc", |v| controller.check(v)),
        None if controller_required => v.error("controller_nextgc", "section is required"),
        None => {}
    }
}

/// Validates the demo server configuration.
pub fn validate_config(config: &AllocatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut v = Validator::default();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        v.error("listener.bind_address", "must be a socket address");
    }
    if config.listener.max_allocation_bytes == 0 {
        v.error("listener.max_allocation_bytes", "must be greater than zero");
    }
    if config.timeouts.request_secs == 0 {
        v.error("timeouts.request_secs", "must be greater than zero");
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        v.error("observability.metrics_address", "must be a socket address");
    }
    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        v.error(
            "observability.log_level",
            format!("must be one of {}", LOG_LEVELS.join(", ")),
        );
    }
    if config.stats_period.is_zero() {
        v.error("stats_period", "must be greater than zero");
    }

    v.nested("memlimiter", |v| check_memlimiter(&config.memlimiter, false, v));

    v.finish()
}
