//! Shutdown coordination for subsystems owning background tasks.
//!
//! # Data Flow
//! ```text
//! Start a task:
//!     breaker.guard()? → tokio::spawn(task holding BreakerGuard)
//!
//! Stop the subsystem:
//!     shutdown() → done() resolves for every task, guard() starts failing
//!     wait()     → returns once every guard has been dropped
//! ```
//!
//! # Design Decisions
//! - Count and mode are plain atomics; no path takes a lock
//! - Shutdown is one-way and idempotent
//! - Waiting on an operational breaker is a programming error and panics
//! - Every task that owns a slot releases it through a RAII guard

use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

const OPERATIONAL: u8 = 1;
const SHUTDOWN: u8 = 2;

/// Error returned to callers racing with shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BreakerError {
    #[error("breaker is not operational")]
    NotOperational,
}

/// Reference-counted shutdown barrier with a cancellation broadcast.
#[derive(Debug)]
pub struct Breaker {
    count: AtomicI64,
    mode: AtomicU8,
    exit: CancellationToken,
}

impl Breaker {
    pub fn new() -> Self {
        Self::with_init_value(0)
    }

    /// Creates a breaker that already accounts for `value` tasks.
    ///
    /// Convenient for actors and pools that know their task count up front;
    /// each of those tasks takes over its slot with [`BreakerGuard::adopt`].
    pub fn with_init_value(value: i64) -> Self {
        Self {
            count: AtomicI64::new(value),
            mode: AtomicU8::new(OPERATIONAL),
            exit: CancellationToken::new(),
        }
    }

    /// Registers one more in-flight task.
    pub fn increment(&self) -> Result<(), BreakerError> {
        // Increment first, then re-check the mode: a concurrent `shutdown` either
        // sees our slot in `wait` or we see its mode flip and roll back.
        self.count.fetch_add(1, Ordering::SeqCst);

        if !self.is_operational() {
            self.count.fetch_sub(1, Ordering::SeqCst);
            return Err(BreakerError::NotOperational);
        }

        Ok(())
    }

    /// Releases a slot taken by [`Breaker::increment`].
    pub fn decrement(&self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }

    /// Increments the counter and returns a guard that decrements it on drop.
    pub fn guard(self: &Arc<Self>) -> Result<BreakerGuard, BreakerError> {
        self.increment()?;
        Ok(BreakerGuard {
            breaker: Arc::clone(self),
        })
    }

    /// Number of tasks currently registered.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_operational(&self) -> bool {
        self.mode.load(Ordering::SeqCst) == OPERATIONAL
    }

    /// Switches the breaker to shutdown mode and notifies every waiter.
    pub fn shutdown(&self) {
        if self
            .mode
            .compare_exchange(OPERATIONAL, SHUTDOWN, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.exit.cancel();
        }
    }

    /// Blocks the current thread until every registered task is done.
    ///
    /// # Panics
    /// Panics if the breaker is still operational.
    pub fn wait(&self) {
        self.assert_shutdown();

        while self.count.load(Ordering::SeqCst) > 0 {
            std::thread::yield_now();
        }
    }

    /// Async flavour of [`Breaker::wait`], yielding to the Tokio scheduler
    /// between polls so that the tasks being waited on can make progress.
    ///
    /// # Panics
    /// Panics if the breaker is still operational.
    pub async fn wait_async(&self) {
        self.assert_shutdown();

        while self.count.load(Ordering::SeqCst) > 0 {
            tokio::task::yield_now().await;
        }
    }

    pub fn shutdown_and_wait(&self) {
        self.shutdown();
        self.wait();
    }

    pub async fn shutdown_and_wait_async(&self) {
        self.shutdown();
        self.wait_async().await;
    }

    /// Resolves once shutdown has begun.
    pub fn done(&self) -> WaitForCancellationFuture<'_> {
        self.exit.cancelled()
    }

    /// Cancellation token tied to this breaker, for code that expects a token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.exit.clone()
    }

    /// Returns [`BreakerError::NotOperational`] once shut down.
    pub fn err(&self) -> Option<BreakerError> {
        if self.is_operational() {
            None
        } else {
            Some(BreakerError::NotOperational)
        }
    }

    fn assert_shutdown(&self) {
        if self.mode.load(Ordering::SeqCst) != SHUTDOWN {
            panic!("cannot wait on operational Breaker, turn it off first");
        }
    }
}

impl Default for Breaker {
    fn default() -> Self {
        Self::new()
    }
}

/// A RAII guard holding one slot of a [`Breaker`].
#[derive(Debug)]
pub struct BreakerGuard {
    breaker: Arc<Breaker>,
}

impl BreakerGuard {
    /// Takes ownership of a slot that was counted at construction time
    /// (see [`Breaker::with_init_value`]) without incrementing again.
    pub fn adopt(breaker: Arc<Breaker>) -> Self {
        Self { breaker }
    }
}

impl Drop for BreakerGuard {
    fn drop(&mut self) {
        self.breaker.decrement();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_increment_after_shutdown_fails() {
        let breaker = Breaker::new();
        assert!(breaker.increment().is_ok());
        breaker.decrement();

        breaker.shutdown();
        assert_eq!(breaker.increment(), Err(BreakerError::NotOperational));
        assert_eq!(breaker.count(), 0);
        assert_eq!(breaker.err(), Some(BreakerError::NotOperational));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let breaker = Breaker::new();
        assert!(breaker.is_operational());
        assert!(breaker.err().is_none());

        breaker.shutdown();
        breaker.shutdown();
        assert!(!breaker.is_operational());
        assert!(breaker.cancellation_token().is_cancelled());
    }

    #[test]
    #[should_panic(expected = "cannot wait on operational Breaker")]
    fn test_wait_before_shutdown_panics() {
        let breaker = Breaker::new();
        breaker.wait();
    }

    #[test]
    fn test_shutdown_and_wait_drains_threads() {
        const TASKS: usize = 16;

        let breaker = Arc::new(Breaker::new());
        let started = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..TASKS {
            let guard = breaker.guard().unwrap();
            let started = started.clone();
            let completed = completed.clone();
            handles.push(std::thread::spawn(move || {
                let _guard = guard;
                started.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                completed.fetch_add(1, Ordering::SeqCst);
            }));
        }

        breaker.shutdown_and_wait();
        assert_eq!(completed.load(Ordering::SeqCst), TASKS);
        assert_eq!(started.load(Ordering::SeqCst), TASKS);
        assert!(breaker.guard().is_err());

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[tokio::test]
    async fn test_done_resolves_for_tasks() {
        let breaker = Arc::new(Breaker::with_init_value(1));
        let completed = Arc::new(AtomicUsize::new(0));

        let task_breaker = breaker.clone();
        let task_completed = completed.clone();
        tokio::spawn(async move {
            let _guard = BreakerGuard::adopt(task_breaker.clone());
            task_breaker.done().await;
            task_completed.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);

        breaker.shutdown_and_wait_async().await;
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.count(), 0);
    }
}
