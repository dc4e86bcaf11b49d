//! Concurrency guard around the tracker state.
//!
//! All registry, ledger and statistics access goes through
//! [`ConcurrencyGuard::with_state`]. The closure runs to completion before
//! another caller can observe the state, including the underlying allocator
//! call made inside it.

use std::cell::RefCell;

use parking_lot::Mutex;

use crate::ledger::ReleaseLedger;
use crate::registry::Registry;
use crate::stats::{FaultCounts, UsageStats};

/// Everything a tracker mutates.
#[derive(Debug, Default)]
pub struct TrackerState {
    pub registry: Registry,
    pub ledger: ReleaseLedger,
    pub stats: UsageStats,
    pub faults: FaultCounts,
    next_decision_id: u64,
}

impl TrackerState {
    /// Next monotonic diagnostic id (starts at 1).
    pub fn next_decision_id(&mut self) -> u64 {
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        self.next_decision_id
    }
}

/// Serializes access to a [`TrackerState`].
pub trait ConcurrencyGuard: Default {
    fn with_state<R>(&self, f: impl FnOnce(&mut TrackerState) -> R) -> R;
}

/// One process-wide mutex. Thread-safe; the default guard.
#[derive(Debug, Default)]
pub struct CoarseLock {
    state: Mutex<TrackerState>,
}

impl ConcurrencyGuard for CoarseLock {
    fn with_state<R>(&self, f: impl FnOnce(&mut TrackerState) -> R) -> R {
        f(&mut self.state.lock())
    }
}

/// No locking, for single-threaded hosts.
///
/// `NoLock` is `!Sync`, so a tracker using it cannot be shared between
/// threads. Re-entering the tracker from a diagnostic sink panics.
#[derive(Debug, Default)]
pub struct NoLock {
    state: RefCell<TrackerState>,
}

impl ConcurrencyGuard for NoLock {
    fn with_state<R>(&self, f: impl FnOnce(&mut TrackerState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }
}
