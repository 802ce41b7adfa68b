//! Application termination on unrecoverable memory-management errors.
//!
//! Every application has its own graceful termination protocol, so the
//! decision of how to stop is delegated to the host through
//! [`ApplicationTerminator`].

use tokio::sync::mpsc;

/// Boxed error crossing subsystem boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Receives fatal errors from the control loop.
///
/// The application is expected to terminate within or after this call.
pub trait ApplicationTerminator: Send + Sync {
    fn terminate(&self, fatal_err: BoxError);
}

/// Logs the error and exits the process immediately.
///
/// Only suitable for simple, stateless services.
#[derive(Debug, Default, Clone, Copy)]
pub struct UngracefulTerminator;

impl ApplicationTerminator for UngracefulTerminator {
    fn terminate(&self, fatal_err: BoxError) {
        tracing::error!(error = %fatal_err, "Terminating application due to fatal error");
        std::process::exit(1);
    }
}

/// Forwards fatal errors into a channel so another task can run the shutdown.
#[derive(Debug, Clone)]
pub struct ChannelTerminator {
    tx: mpsc::UnboundedSender<BoxError>,
}

impl ChannelTerminator {
    pub fn new(tx: mpsc::UnboundedSender<BoxError>) -> Self {
        Self { tx }
    }
}

impl ApplicationTerminator for ChannelTerminator {
    fn terminate(&self, fatal_err: BoxError) {
        if let Err(e) = self.tx.send(fatal_err) {
            tracing::error!(error = %e.0, "Fatal error receiver is gone");
        }
    }
}
