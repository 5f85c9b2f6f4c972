use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("value unchanged after `{0:?}`")]
pub struct WaitTimeout(pub Duration);

/// Shared cell holding the single current value of type `S`.
///
/// The value is replaced wholesale, never mutated in place. Replacement is
/// conditional on identity: `compare_and_set` only succeeds when the caller
/// still holds the exact `Arc` that is current, so two structurally equal
/// values produced by racing transitions never satisfy each other's CAS.
/// Every successful replacement wakes all threads blocked in
/// [`StateCell::await_change_from`].
#[derive(Debug)]
pub struct StateCell<S> {
    value: Mutex<Arc<S>>,
    changed: Condvar,
}

impl<S> StateCell<S> {
    pub fn new(initial: S) -> Self {
        Self {
            value: Mutex::new(Arc::new(initial)),
            changed: Condvar::new(),
        }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> Arc<S> {
        Arc::clone(&self.value.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the current value with `next` iff it is still identical to
    /// `expected`. Returns whether the replacement happened.
    pub fn compare_and_set(&self, expected: &Arc<S>, next: Arc<S>) -> bool {
        let mut current = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        if !Arc::ptr_eq(&current, expected) {
            return false;
        }
        *current = next;
        self.changed.notify_all();
        true
    }

    /// Blocks until the current value is no longer identical to `expected`,
    /// returning the value that replaced it. Fails once `timeout` elapses
    /// with the value still unchanged.
    pub fn await_change_from(
        &self,
        expected: &Arc<S>,
        timeout: Duration,
    ) -> Result<Arc<S>, WaitTimeout> {
        let deadline = Instant::now() + timeout;
        let mut current = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        while Arc::ptr_eq(&current, expected) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(WaitTimeout(timeout));
            }
            (current, _) = self
                .changed
                .wait_timeout(current, remaining)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(Arc::clone(&current))
    }
}
