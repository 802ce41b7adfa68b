//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytesize::ByteSize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use memlimiter::backpressure::{Operator, OperatorError};
use memlimiter::controller::nextgc::{ComponentProportionalConfig, ControllerConfig};
use memlimiter::stats::{BackpressureStats, ControlParameters, MemorySnapshot};
use memlimiter::utils::{BoxError, ChannelTerminator};

pub const MB: u64 = 1_000_000;

/// 1000MB limit, GC zone at 50%, throttling zone at 90%, no smoothing.
pub fn controller_config(period: Duration) -> ControllerConfig {
    ControllerConfig {
        rss_limit: ByteSize::b(1000 * MB),
        danger_zone_gogc: 50,
        danger_zone_throttling: 90,
        period,
        component_proportional: ComponentProportionalConfig {
            coefficient: 1.0,
            window_size: 0,
        },
    }
}

pub fn snapshot(next_gc: u64, rss: u64) -> MemorySnapshot {
    MemorySnapshot {
        next_gc,
        rss: Some(rss),
        consumption_report: None,
    }
}

pub fn terminator() -> (Arc<ChannelTerminator>, mpsc::UnboundedReceiver<BoxError>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelTerminator::new(tx)), rx)
}

/// Operator that records every applied value and admits requests according
/// to a fixed switch.
pub struct RecordingOperator {
    allow: AtomicBool,
    applied: Mutex<Vec<ControlParameters>>,
    tx: mpsc::UnboundedSender<ControlParameters>,
}

impl RecordingOperator {
    pub fn new(allow: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<ControlParameters>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let operator = Arc::new(Self {
            allow: AtomicBool::new(allow),
            applied: Mutex::new(Vec::new()),
            tx,
        });
        (operator, rx)
    }

    pub fn applied(&self) -> Vec<ControlParameters> {
        self.applied.lock().unwrap().clone()
    }
}

impl Operator for RecordingOperator {
    fn set_control_parameters(&self, value: ControlParameters) -> Result<(), OperatorError> {
        self.applied.lock().unwrap().push(value.clone());
        let _ = self.tx.send(value);
        Ok(())
    }

    fn allow_request(&self) -> bool {
        self.allow.load(Ordering::SeqCst)
    }

    fn get_stats(&self) -> Result<BackpressureStats, OperatorError> {
        Ok(BackpressureStats {
            control_parameters: self.applied.lock().unwrap().last().cloned(),
            ..Default::default()
        })
    }
}

/// Pushes the current snapshot into `tx` every `period` until aborted.
pub fn feed(
    tx: mpsc::Sender<MemorySnapshot>,
    current: Arc<Mutex<MemorySnapshot>>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let snapshot = current.lock().unwrap().clone();
            if tx.send(snapshot).await.is_err() {
                return;
            }
        }
    })
}

/// Waits until `rx` yields `expected`, skipping anything else.
pub async fn wait_for_parameters(
    rx: &mut mpsc::UnboundedReceiver<ControlParameters>,
    expected: ControlParameters,
) -> ControlParameters {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let value = rx.recv().await.expect("operator dropped");
            if value == expected {
                return value;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {expected}"))
}
