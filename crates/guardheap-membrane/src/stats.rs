//! Usage statistics and fault tallies.
//!
//! Both are plain counters living inside the tracker state, so they change
//! in the same critical section as the registry mutation they describe and a
//! snapshot is always internally consistent.

use serde::{Deserialize, Serialize};

use crate::diagnostics::DiagnosticKind;

/// Point-in-time view of the four usage counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Bytes ever requested (allocations plus resize growth).
    pub cumulative_bytes: usize,
    /// Bytes currently held by live records.
    pub current_bytes: usize,
    /// High-water mark of `current_bytes`.
    pub peak_bytes: usize,
    /// Live records.
    pub live_count: usize,
}

/// Running counters derived from registry mutations.
#[derive(Debug, Default)]
pub struct UsageStats {
    cumulative: usize,
    current: usize,
    peak: usize,
    live: usize,
}

impl UsageStats {
    pub fn record_allocation(&mut self, size: usize) {
        self.cumulative = self.cumulative.saturating_add(size);
        self.current = self.current.saturating_add(size);
        self.live = self.live.saturating_add(1);
        self.bump_peak();
    }

    /// Apply a resize from `old` to `new` bytes.
    ///
    /// Returns false if `current` would have gone negative (clamped to zero).
    pub fn record_resize(&mut self, old: usize, new: usize) -> bool {
        let consistent = if new >= old {
            let growth = new - old;
            self.cumulative = self.cumulative.saturating_add(growth);
            self.current = self.current.saturating_add(growth);
            true
        } else {
            self.shrink_current(old - new)
        };
        self.bump_peak();
        consistent
    }

    /// Remove a released record of `size` bytes.
    ///
    /// Returns false if either counter would have gone negative.
    pub fn record_release(&mut self, size: usize) -> bool {
        let bytes_ok = self.shrink_current(size);
        let count_ok = match self.live.checked_sub(1) {
            Some(next) => {
                self.live = next;
                true
            }
            None => {
                self.live = 0;
                false
            }
        };
        bytes_ok && count_ok
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cumulative_bytes: self.cumulative,
            current_bytes: self.current,
            peak_bytes: self.peak,
            live_count: self.live,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn shrink_current(&mut self, by: usize) -> bool {
        match self.current.checked_sub(by) {
            Some(next) => {
                self.current = next;
                true
            }
            None => {
                self.current = 0;
                false
            }
        }
    }

    fn bump_peak(&mut self) {
        self.peak = self.peak.max(self.current);
    }
}

/// How often each diagnosable fault has been observed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaultCounts {
    pub unknown_pointer: u64,
    pub double_release: u64,
    pub resize_after_release: u64,
    /// Counted per corrupted region, so one block can contribute two.
    pub guard_corruption: u64,
    pub out_of_memory: u64,
    pub count_overflow: u64,
    pub accounting_underflow: u64,
}

impl FaultCounts {
    pub fn note(&mut self, kind: DiagnosticKind) {
        let counter = match kind {
            DiagnosticKind::UnknownPointer => &mut self.unknown_pointer,
            DiagnosticKind::DoubleRelease => &mut self.double_release,
            DiagnosticKind::ResizeAfterRelease => &mut self.resize_after_release,
            DiagnosticKind::GuardCorruption => &mut self.guard_corruption,
            DiagnosticKind::OutOfMemory => &mut self.out_of_memory,
            DiagnosticKind::CountOverflow => &mut self.count_overflow,
            DiagnosticKind::AccountingUnderflow => &mut self.accounting_underflow,
        };
        *counter = counter.saturating_add(1);
    }

    /// Sum of every tally.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.unknown_pointer
            .saturating_add(self.double_release)
            .saturating_add(self.resize_after_release)
            .saturating_add(self.guard_corruption)
            .saturating_add(self.out_of_memory)
            .saturating_add(self.count_overflow)
            .saturating_add(self.accounting_underflow)
    }
}
