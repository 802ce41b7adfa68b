//! Telemetry stream implementations.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time;

use crate::breaker::{Breaker, BreakerGuard};
use crate::stats::service::{MemorySnapshot, ServiceStatsSubscription};

type UpdatesSlot = Mutex<Option<mpsc::Receiver<MemorySnapshot>>>;

fn take_updates(slot: &UpdatesSlot) -> Option<mpsc::Receiver<MemorySnapshot>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// Samples the current process every `period`.
///
/// There is no tracing collector to consult, so the projected size of the
/// next collection is the resident set itself.
pub struct SubscriptionDefault {
    updates: UpdatesSlot,
    breaker: Arc<Breaker>,
}

impl SubscriptionDefault {
    /// Starts the sampling task. Must be called from within a Tokio runtime.
    pub fn new(period: Duration) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let breaker = Arc::new(Breaker::with_init_value(1));

        tokio::spawn(sample_loop(breaker.clone(), tx, period));

        Self {
            updates: Mutex::new(Some(rx)),
            breaker,
        }
    }
}

#[async_trait]
impl ServiceStatsSubscription for SubscriptionDefault {
    fn updates(&self) -> Option<mpsc::Receiver<MemorySnapshot>> {
        take_updates(&self.updates)
    }

    async fn quit(&self) {
        self.breaker.shutdown_and_wait_async().await;
    }
}

impl Drop for SubscriptionDefault {
    fn drop(&mut self) {
        self.breaker.shutdown();
    }
}

async fn sample_loop(breaker: Arc<Breaker>, tx: mpsc::Sender<MemorySnapshot>, period: Duration) {
    let _guard = BreakerGuard::adopt(breaker.clone());
    let mut ticker = time::interval(period);

    tracing::debug!(period = ?period, "Process memory sampler starting");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = match sample() {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to sample process memory");
                        continue;
                    }
                };

                tokio::select! {
                    res = tx.send(snapshot) => {
                        if res.is_err() {
                            tracing::debug!("Telemetry receiver dropped, sampler exiting");
                            return;
                        }
                    }
                    _ = breaker.done() => return,
                }
            }
            _ = breaker.done() => {
                tracing::debug!("Process memory sampler received shutdown signal");
                return;
            }
        }
    }
}

fn sample() -> io::Result<MemorySnapshot> {
    let rss = read_rss()?;
    Ok(MemorySnapshot {
        next_gc: rss,
        rss: Some(rss),
        consumption_report: None,
    })
}

#[cfg(target_os = "linux")]
fn read_rss() -> io::Result<u64> {
    let status = std::fs::read_to_string("/proc/self/status")?;
    parse_vm_rss(&status).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "VmRSS not found in /proc/self/status")
    })
}

#[cfg(not(target_os = "linux"))]
fn read_rss() -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "resident set size sampling is only supported on Linux",
    ))
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_rss(status: &str) -> Option<u64> {
    let rest = status.lines().find_map(|line| line.strip_prefix("VmRSS:"))?;
    let mut parts = rest.split_whitespace();
    let value: u64 = parts.next()?.parse().ok()?;
    let multiplier = match parts.next().unwrap_or("kB") {
        "B" => 1,
        "kB" => 1024,
        "mB" | "MB" => 1024 * 1024,
        "gB" | "GB" => 1024 * 1024 * 1024,
        _ => return None,
    };
    value.checked_mul(multiplier)
}

/// Telemetry pushed by the host through a channel.
///
/// Useful when the application already collects memory statistics itself.
pub struct ChannelSubscription {
    updates: UpdatesSlot,
}

impl ChannelSubscription {
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<MemorySnapshot>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                updates: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

#[async_trait]
impl ServiceStatsSubscription for ChannelSubscription {
    fn updates(&self) -> Option<mpsc::Receiver<MemorySnapshot>> {
        take_updates(&self.updates)
    }

    async fn quit(&self) {
        tracing::debug!("Channel subscription quit; producer owns the stream lifetime");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vm_rss() {
        let status = "Name:\tmemlimiter\nVmPeak:\t  20000 kB\nVmRSS:\t   1500 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss(status), Some(1500 * 1024));
        assert_eq!(parse_vm_rss("Name:\tx\n"), None);
        assert_eq!(parse_vm_rss("VmRSS:\t abc kB\n"), None);
    }

    #[tokio::test]
    async fn test_channel_subscription_hands_out_stream_once() {
        let (subscription, tx) = ChannelSubscription::new(1);
        let mut rx = subscription.updates().unwrap();
        assert!(subscription.updates().is_none());

        tx.send(MemorySnapshot { next_gc: 42, ..Default::default() }).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().next_gc, 42);

        subscription.quit().await;
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_default_subscription_samples_process() {
        let subscription = SubscriptionDefault::new(Duration::from_millis(10));
        let mut rx = subscription.updates().unwrap();

        let snapshot = time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(snapshot.rss.unwrap() > 0);
        assert_eq!(Some(snapshot.next_gc), snapshot.rss);

        subscription.quit().await;
    }
}
