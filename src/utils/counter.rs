//! Lock-free monotonic counters with optional parent rollup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A monotonically increasing counter.
///
/// Increments are propagated to the parent (and its parents), so a group of
/// child counters always sums into their common ancestor.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
    parent: Option<Arc<Counter>>,
}

impl Counter {
    pub fn new(parent: Option<Arc<Counter>>) -> Self {
        Self {
            value: AtomicU64::new(0),
            parent,
        }
    }

    pub fn inc(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
        if let Some(parent) = &self.parent {
            parent.inc(delta);
        }
    }

    pub fn count(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_roll_up_into_parent() {
        let root = Arc::new(Counter::new(None));
        let total = Arc::new(Counter::new(Some(root.clone())));
        let passed = Counter::new(Some(total.clone()));
        let throttled = Counter::new(Some(total.clone()));

        passed.inc(3);
        throttled.inc(2);

        assert_eq!(passed.count(), 3);
        assert_eq!(throttled.count(), 2);
        assert_eq!(total.count(), 5);
        assert_eq!(root.count(), 5);
    }
}
