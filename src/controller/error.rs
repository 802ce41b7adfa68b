//! Controller error types.

use crate::backpressure::OperatorError;
use crate::breaker::BreakerError;
use crate::utils::BoxError;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("controller is not running")]
    Breaker(#[from] BreakerError),

    #[error("controller loop has exited")]
    Stopped,

    #[error("invalid controller configuration: {0}")]
    InvalidConfig(String),

    #[error("telemetry stream is already taken by another consumer")]
    TelemetryUnavailable,

    #[error("telemetry stream closed unexpectedly")]
    TelemetryClosed,

    #[error("value is undefined if memory usage = {0}")]
    Utilization(f64),

    #[error("unmanaged consumers ({unmanaged} bytes) exhaust the memory limit ({limit} bytes)")]
    Budget { limit: u64, unmanaged: u64 },

    #[error("predefined consumers report")]
    ConsumptionReport(#[source] BoxError),

    #[error("set control parameters: {params}")]
    ApplyControlParameters {
        params: String,
        #[source]
        source: OperatorError,
    },
}
