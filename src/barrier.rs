//! Readiness gate for topology start-up
//!
//! The bootstrapper must not let `reset`/`search` commands flow until every
//! evaluator unit has finished its bootstrap. The gate is resolved by the
//! event that records a ready signal (condvar wakeup), not by interval
//! polling, while keeping the observable contract: it releases exactly once,
//! the first time the expected set is complete.
//!
//! Duplicate ready signals from one evaluator are idempotent — the set is
//! keyed by worker number, so a noisy evaluator can never stand in for a
//! silent one.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Condvar-backed barrier counting distinct ready signals
pub struct ReadyGate {
    state: Mutex<HashSet<u32>>,
    cv: Condvar,
    expected: usize,
}

impl ReadyGate {
    /// Gate expecting `expected` distinct worker numbers
    pub fn new(expected: usize) -> Self {
        Self {
            state: Mutex::new(HashSet::new()),
            cv: Condvar::new(),
            expected,
        }
    }

    /// Record a ready signal. Returns `false` for a duplicate.
    pub fn mark_ready(&self, worker_num: u32) -> bool {
        let mut ready = self.state.lock().expect("gate poisoned");
        let first = ready.insert(worker_num);
        if first && ready.len() >= self.expected {
            self.cv.notify_all();
        }
        first
    }

    /// Number of distinct ready signals seen so far
    pub fn ready_count(&self) -> usize {
        self.state.lock().expect("gate poisoned").len()
    }

    /// Whether the expected set is complete
    pub fn is_complete(&self) -> bool {
        self.ready_count() >= self.expected
    }

    /// Block until the expected set is complete
    pub fn wait(&self) {
        let mut ready = self.state.lock().expect("gate poisoned");
        while ready.len() < self.expected {
            ready = self.cv.wait(ready).expect("gate poisoned");
        }
    }

    /// Block until complete or `timeout` elapses. Returns `true` on completion.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut ready = self.state.lock().expect("gate poisoned");
        while ready.len() < self.expected {
            let remaining = match deadline.checked_duration_since(std::time::Instant::now()) {
                Some(d) => d,
                None => return false,
            };
            let (guard, result) = self
                .cv
                .wait_timeout(ready, remaining)
                .expect("gate poisoned");
            ready = guard;
            if result.timed_out() && ready.len() < self.expected {
                return false;
            }
        }
        true
    }
}
