//! The instrumented allocator.
//!
//! A [`Tracker`] owns the allocation registry, release ledger, usage
//! statistics and fault tallies behind one [`ConcurrencyGuard`]. Every public
//! operation runs inside a single `with_state` critical section, including the
//! underlying allocator call and guard verification, so records, statistics
//! and the actual heap never disagree.
//!
//! Detected misuse (unknown pointers, double release, guard corruption) is
//! reported through the diagnostic sink and resolved with a fixed fallback.
//! Only out-of-memory and count overflow are returned as errors, plus the
//! refusal to resize an already released pointer.

#![allow(unsafe_code)]

use std::io::{self, Write};
use std::ptr::NonNull;

use crate::config::TrackerConfig;
use crate::diagnostics::{
    DiagnosticKind, DiagnosticLevel, DiagnosticRecord, DiagnosticSink, StderrSink,
};
use crate::error::TrackerError;
use crate::guard::{
    GuardCheck, guarded_len, raw_address_of, user_view, verify_guards, write_guards,
};
use crate::heap::{RawAllocator, SystemHeap};
use crate::lock::{CoarseLock, ConcurrencyGuard, NoLock, TrackerState};
use crate::registry::BlockPtr;
use crate::report::{self, LeakEntry, LeakReport};
use crate::site::OriginSite;
use crate::stats::{FaultCounts, StatsSnapshot};

/// Path taken by [`Tracker::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Null pointer; nothing happened.
    Null,
    /// Tracked block released with intact guards.
    Released,
    /// Tracked block released after guard corruption was reported.
    ReleasedWithCorruption,
    /// Raw address already in the release ledger; ignored.
    DoubleRelease,
    /// Not tracked; handed to the underlying allocator as-is.
    UnknownPointer,
    /// Tracking is off; handed to the underlying allocator as-is.
    PassedThrough,
}

impl ReleaseOutcome {
    /// True when the underlying allocator was asked to release memory.
    #[must_use]
    pub const fn reached_allocator(self) -> bool {
        matches!(
            self,
            Self::Released
                | Self::ReleasedWithCorruption
                | Self::UnknownPointer
                | Self::PassedThrough
        )
    }
}

/// Operation name and call site shared by every record an operation emits.
#[derive(Clone, Copy)]
struct Op<'a> {
    symbol: &'static str,
    site: &'a OriginSite,
}

/// Debug allocation layer over a [`RawAllocator`].
pub struct Tracker<A: RawAllocator = SystemHeap, G: ConcurrencyGuard = CoarseLock> {
    heap: A,
    guard: G,
    config: TrackerConfig,
    sink: Box<dyn DiagnosticSink>,
}

impl Tracker<SystemHeap, CoarseLock> {
    /// Thread-safe tracker over the C heap, default configuration,
    /// diagnostics to stderr.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(SystemHeap, CoarseLock::default())
    }
}

impl Default for Tracker<SystemHeap, CoarseLock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: RawAllocator> Tracker<A, CoarseLock> {
    /// Thread-safe tracker over `heap`.
    #[must_use]
    pub fn with_heap(heap: A) -> Self {
        Self::from_parts(heap, CoarseLock::default())
    }
}

impl<A: RawAllocator> Tracker<A, NoLock> {
    /// Tracker without locking. The result is `!Sync`.
    #[must_use]
    pub fn unsynchronized(heap: A) -> Self {
        Self::from_parts(heap, NoLock::default())
    }
}

impl<A: RawAllocator, G: ConcurrencyGuard> Tracker<A, G> {
    fn from_parts(heap: A, guard: G) -> Self {
        Self {
            heap,
            guard,
            config: TrackerConfig::default(),
            sink: Box::new(StderrSink),
        }
    }

    /// Replace the configuration. Intended for construction time: switching
    /// mode with blocks outstanding strands them.
    #[must_use]
    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    #[must_use]
    pub fn config(&self) -> TrackerConfig {
        self.config
    }

    /// Allocate `size` bytes (zero is treated as one).
    ///
    /// The returned pointer is aligned to `GUARD_SIZE` (8) bytes.
    pub fn allocate(&self, size: usize, site: OriginSite) -> Result<NonNull<u8>, TrackerError> {
        self.allocate_as("allocate", size, site)
    }

    /// Allocate `count * element_size` zeroed bytes.
    ///
    /// Overflow of the product is detected before the underlying allocator is
    /// consulted; nothing is allocated in that case.
    pub fn allocate_zeroed(
        &self,
        count: usize,
        element_size: usize,
        site: OriginSite,
    ) -> Result<NonNull<u8>, TrackerError> {
        let Some(total) = count.checked_mul(element_size) else {
            if self.config.mode.tracking_enabled() {
                let op = Op {
                    symbol: "allocate_zeroed",
                    site: &site,
                };
                self.guard.with_state(|state| {
                    self.fault(
                        state,
                        op,
                        DiagnosticKind::CountOverflow,
                        DiagnosticLevel::Warn,
                        "count_overflow",
                        |r| {
                            r.with_outcome("refused").with_message(format!(
                                "count overflow in multiplication ({count} x {element_size}) at {site}"
                            ))
                        },
                    );
                });
            }
            return Err(TrackerError::CountOverflow {
                count,
                element_size,
            });
        };
        let ptr = self.allocate_as("allocate_zeroed", total, site)?;
        // SAFETY: the block was just obtained with at least max(total, 1) bytes.
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, total.max(1)) };
        Ok(ptr)
    }

    /// Resize a block.
    ///
    /// `None` allocates. A `new_size` of zero releases and yields `Ok(None)`.
    /// On failure the original block is left untouched and still tracked.
    ///
    /// # Safety
    ///
    /// `ptr` must be `None`, a live pointer returned by this tracker, a
    /// pointer already released through this tracker (refused with
    /// [`TrackerError::ReleasedPointer`]), or a live block from the
    /// underlying allocator (resized untracked).
    pub unsafe fn resize(
        &self,
        ptr: Option<NonNull<u8>>,
        new_size: usize,
        site: OriginSite,
    ) -> Result<Option<NonNull<u8>>, TrackerError> {
        let Some(ptr) = ptr else {
            return self.allocate_as("resize", new_size, site).map(Some);
        };
        if new_size == 0 {
            // SAFETY: forwarded caller contract.
            unsafe { self.release(Some(ptr), site) };
            return Ok(None);
        }
        if !self.config.mode.tracking_enabled() {
            // SAFETY: with tracking off every pointer is an underlying block.
            return unsafe { self.heap.resize(ptr, new_size) }
                .map(Some)
                .ok_or(TrackerError::OutOfMemory {
                    requested: new_size,
                });
        }

        let op = Op {
            symbol: "resize",
            site: &site,
        };
        let user_addr = ptr.as_ptr() as usize;
        self.guard.with_state(|state| {
            let Some((raw, old_size)) = state
                .registry
                .get(user_addr)
                .map(|r| (r.raw, r.requested_size))
            else {
                // SAFETY: forwarded caller contract.
                return unsafe { self.resize_untracked(state, op, ptr, new_size) };
            };

            self.check_guards(state, op, user_addr);

            let Some(total) = guarded_len(new_size) else {
                return Err(self.out_of_memory(state, op, new_size));
            };
            // SAFETY: registered raw blocks are live blocks of this heap.
            let Some(new_raw) = (unsafe { self.heap.resize(raw.as_non_null(), total) }) else {
                return Err(self.out_of_memory(state, op, new_size));
            };
            // SAFETY: new_raw is valid for `total` bytes.
            let new_user = unsafe {
                write_guards(new_raw, new_size);
                user_view(new_raw)
            };
            let new_user_addr = new_user.as_ptr() as usize;
            let new_raw = BlockPtr::new(new_raw);

            state.ledger.forget(new_raw.addr());
            if new_raw != raw {
                // The underlying resize released the old block.
                state.ledger.record(raw.addr());
            }
            state
                .registry
                .relocate(user_addr, new_raw, new_user_addr, new_size);
            if !state.stats.record_resize(old_size, new_size) {
                self.note_underflow(state, op, new_user_addr);
            }
            self.emit(state, op, DiagnosticLevel::Trace, "resize", |r| {
                r.with_ptr(new_user_addr).with_size(new_size).with_message(format!(
                    "resized {user_addr:#x} ({old_size} bytes) to {new_user_addr:#x} ({new_size} bytes)"
                ))
            });
            Ok(Some(new_user))
        })
    }

    /// Release a block. Never fails; the outcome names the path taken.
    ///
    /// # Safety
    ///
    /// `ptr` must be `None`, a pointer returned by this tracker (live or
    /// already released through it), or a live block from the underlying
    /// allocator.
    pub unsafe fn release(&self, ptr: Option<NonNull<u8>>, site: OriginSite) -> ReleaseOutcome {
        let Some(ptr) = ptr else {
            return ReleaseOutcome::Null;
        };
        if !self.config.mode.tracking_enabled() {
            // SAFETY: with tracking off every pointer is an underlying block.
            unsafe { self.heap.release(ptr) };
            return ReleaseOutcome::PassedThrough;
        }

        let op = Op {
            symbol: "release",
            site: &site,
        };
        let user_addr = ptr.as_ptr() as usize;
        let raw_addr = raw_address_of(user_addr);
        self.guard.with_state(|state| {
            if state.ledger.contains(raw_addr) {
                self.fault(
                    state,
                    op,
                    DiagnosticKind::DoubleRelease,
                    DiagnosticLevel::Error,
                    "double_release",
                    |r| {
                        r.with_ptr(user_addr).with_outcome("ignored").with_message(format!(
                            "Double release detected for pointer {user_addr:#x} at {site}"
                        ))
                    },
                );
                return ReleaseOutcome::DoubleRelease;
            }

            if !state.registry.contains(user_addr) {
                self.fault(
                    state,
                    op,
                    DiagnosticKind::UnknownPointer,
                    DiagnosticLevel::Warn,
                    "unknown_pointer",
                    |r| {
                        r.with_ptr(user_addr)
                            .with_outcome("untracked_release")
                            .with_message(format!(
                                "Attempt to release unknown pointer {user_addr:#x} at {site}"
                            ))
                    },
                );
                // SAFETY: an untracked pointer is a live underlying block per
                // the caller contract.
                unsafe { self.heap.release(ptr) };
                return ReleaseOutcome::UnknownPointer;
            }

            let check = self.check_guards(state, op, user_addr);
            let Some(record) = state.registry.remove(user_addr) else {
                return ReleaseOutcome::UnknownPointer;
            };
            if !state.stats.record_release(record.requested_size) {
                self.note_underflow(state, op, user_addr);
            }
            state.ledger.record(record.raw.addr());
            // SAFETY: the record owned this live raw block; it is dropped now.
            unsafe { self.heap.release(record.raw.as_non_null()) };

            let size = record.requested_size;
            self.emit(state, op, DiagnosticLevel::Trace, "release", |r| {
                r.with_ptr(user_addr).with_size(size).with_origin(record.origin)
            });
            if check.is_intact() {
                ReleaseOutcome::Released
            } else {
                ReleaseOutcome::ReleasedWithCorruption
            }
        })
    }

    /// Atomic copy of the four usage counters.
    #[must_use]
    pub fn snapshot_stats(&self) -> StatsSnapshot {
        self.guard.with_state(|state| state.stats.snapshot())
    }

    #[must_use]
    pub fn fault_counts(&self) -> FaultCounts {
        self.guard.with_state(|state| state.faults)
    }

    #[must_use]
    pub fn is_tracked(&self, ptr: NonNull<u8>) -> bool {
        self.guard
            .with_state(|state| state.registry.contains(ptr.as_ptr() as usize))
    }

    /// Requested size of a live tracked block.
    #[must_use]
    pub fn tracked_size(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.guard.with_state(|state| {
            state
                .registry
                .get(ptr.as_ptr() as usize)
                .map(|r| r.requested_size)
        })
    }

    /// Live blocks, oldest first.
    #[must_use]
    pub fn leaks(&self) -> Vec<LeakEntry> {
        self.guard.with_state(|state| {
            state
                .registry
                .ordered()
                .into_iter()
                .map(LeakEntry::from)
                .collect()
        })
    }

    /// Live blocks and statistics taken under one lock acquisition.
    #[must_use]
    pub fn leak_report(&self) -> LeakReport {
        self.guard.with_state(|state| {
            LeakReport::new(
                state
                    .registry
                    .ordered()
                    .into_iter()
                    .map(LeakEntry::from)
                    .collect(),
                state.stats.snapshot(),
            )
        })
    }

    /// Write the leak table. The registry is copied first; `out` is written
    /// without holding the lock.
    pub fn dump_leaks(&self, out: &mut impl Write) -> io::Result<()> {
        report::write_leak_table(out, &self.leaks())
    }

    pub fn dump_stats(&self, out: &mut impl Write) -> io::Result<()> {
        report::write_stats(out, &self.snapshot_stats())
    }

    /// Release every live block, clear the registry and ledger, zero the
    /// counters. Returns how many blocks were released.
    ///
    /// Pointers previously handed out become dangling.
    pub fn release_all_tracked(&self) -> usize {
        let site = OriginSite::tag("release_all_tracked");
        let op = Op {
            symbol: "release_all_tracked",
            site: &site,
        };
        self.guard.with_state(|state| {
            let records = state.registry.drain();
            let released = records.len();
            for record in records {
                // SAFETY: each drained record owned a live raw block.
                unsafe { self.heap.release(record.raw.as_non_null()) };
            }
            state.ledger.clear();
            state.stats.reset();
            state.faults = FaultCounts::default();
            if released > 0 {
                self.emit(state, op, DiagnosticLevel::Info, "teardown", |r| {
                    r.with_size(released)
                        .with_message(format!("released {released} tracked blocks"))
                });
            }
            released
        })
    }

    fn allocate_as(
        &self,
        symbol: &'static str,
        size: usize,
        site: OriginSite,
    ) -> Result<NonNull<u8>, TrackerError> {
        let size = size.max(1);
        if !self.config.mode.tracking_enabled() {
            return self
                .heap
                .allocate(size)
                .ok_or(TrackerError::OutOfMemory { requested: size });
        }

        let op = Op {
            symbol,
            site: &site,
        };
        self.guard.with_state(|state| {
            let Some(total) = guarded_len(size) else {
                return Err(self.out_of_memory(state, op, size));
            };
            let Some(raw) = self.heap.allocate(total) else {
                return Err(self.out_of_memory(state, op, size));
            };
            // SAFETY: raw is valid for `total` bytes.
            let user = unsafe {
                write_guards(raw, size);
                user_view(raw)
            };
            let user_addr = user.as_ptr() as usize;
            let raw = BlockPtr::new(raw);

            let reused = state.ledger.forget(raw.addr());
            state.stats.record_allocation(size);
            self.emit(state, op, DiagnosticLevel::Trace, "alloc", |r| {
                r.with_ptr(user_addr)
                    .with_size(size)
                    .with_outcome(if reused { "reused" } else { "success" })
            });
            state.registry.insert(raw, user_addr, size, site.clone());
            Ok(user)
        })
    }

    /// # Safety
    ///
    /// `ptr` must be a live underlying block or a pointer released through
    /// this tracker.
    unsafe fn resize_untracked(
        &self,
        state: &mut TrackerState,
        op: Op<'_>,
        ptr: NonNull<u8>,
        new_size: usize,
    ) -> Result<Option<NonNull<u8>>, TrackerError> {
        let user_addr = ptr.as_ptr() as usize;
        let site = op.site;
        if state.ledger.contains(raw_address_of(user_addr)) {
            self.fault(
                state,
                op,
                DiagnosticKind::ResizeAfterRelease,
                DiagnosticLevel::Error,
                "resize_after_release",
                |r| {
                    r.with_ptr(user_addr).with_outcome("refused").with_message(format!(
                        "Resize of released pointer {user_addr:#x} at {site}"
                    ))
                },
            );
            return Err(TrackerError::ReleasedPointer { ptr: user_addr });
        }

        self.fault(
            state,
            op,
            DiagnosticKind::UnknownPointer,
            DiagnosticLevel::Warn,
            "unknown_pointer",
            |r| {
                r.with_ptr(user_addr)
                    .with_size(new_size)
                    .with_outcome("untracked_resize")
                    .with_message(format!(
                        "Attempt to resize unknown pointer {user_addr:#x} at {site}"
                    ))
            },
        );
        // SAFETY: not released through us, so a live underlying block.
        match unsafe { self.heap.resize(ptr, new_size) } {
            Some(moved) => Ok(Some(moved)),
            None => Err(self.out_of_memory(state, op, new_size)),
        }
    }

    /// Verify both guards of a registered block; one diagnostic per
    /// corrupted region.
    fn check_guards(&self, state: &mut TrackerState, op: Op<'_>, user_addr: usize) -> GuardCheck {
        let (raw, size) = match state.registry.get(user_addr) {
            Some(record) => (record.raw, record.requested_size),
            None => return GuardCheck::Intact,
        };
        // SAFETY: registered blocks are live and span size + GUARD_OVERHEAD bytes.
        let check = unsafe { verify_guards(raw.as_non_null(), size) };
        if check.is_intact() {
            return check;
        }

        let origin = state
            .registry
            .get(user_addr)
            .map_or_else(OriginSite::unknown, |r| r.origin.clone());
        for &region in check.corrupted_regions() {
            self.fault(
                state,
                op,
                DiagnosticKind::GuardCorruption,
                DiagnosticLevel::Error,
                "guard_corrupted",
                |r| {
                    r.with_region(region)
                        .with_ptr(user_addr)
                        .with_size(size)
                        .with_origin(origin.clone())
                        .with_outcome("continued")
                        .with_message(format!(
                            "{} guard corrupted for pointer {user_addr:#x} (allocated at {origin})",
                            region.label()
                        ))
                },
            );
        }
        check
    }

    fn out_of_memory(&self, state: &mut TrackerState, op: Op<'_>, size: usize) -> TrackerError {
        let site = op.site;
        self.fault(
            state,
            op,
            DiagnosticKind::OutOfMemory,
            DiagnosticLevel::Warn,
            "out_of_memory",
            |r| {
                r.with_size(size)
                    .with_outcome("failed")
                    .with_message(format!("out of memory: {size} bytes requested at {site}"))
            },
        );
        TrackerError::OutOfMemory { requested: size }
    }

    fn note_underflow(&self, state: &mut TrackerState, op: Op<'_>, user_addr: usize) {
        let symbol = op.symbol;
        self.fault(
            state,
            op,
            DiagnosticKind::AccountingUnderflow,
            DiagnosticLevel::Error,
            "accounting_underflow",
            |r| {
                r.with_ptr(user_addr)
                    .with_outcome("clamped")
                    .with_message(format!(
                        "usage counters underflowed during {symbol} of {user_addr:#x}; clamped to zero"
                    ))
            },
        );
    }

    fn fault(
        &self,
        state: &mut TrackerState,
        op: Op<'_>,
        kind: DiagnosticKind,
        level: DiagnosticLevel,
        event: &'static str,
        build: impl FnOnce(DiagnosticRecord) -> DiagnosticRecord,
    ) {
        state.faults.note(kind);
        self.emit(state, op, level, event, |r| build(r.with_kind(kind)));
    }

    fn emit(
        &self,
        state: &mut TrackerState,
        op: Op<'_>,
        level: DiagnosticLevel,
        event: &'static str,
        build: impl FnOnce(DiagnosticRecord) -> DiagnosticRecord,
    ) {
        let decision_id = state.next_decision_id();
        if level < self.config.min_level {
            return;
        }
        let record = build(DiagnosticRecord::new(
            decision_id,
            level,
            op.symbol,
            event,
            op.site.clone(),
        ));
        self.sink.record(&record);
    }
}

impl<A: RawAllocator, G: ConcurrencyGuard> Drop for Tracker<A, G> {
    fn drop(&mut self) {
        self.release_all_tracked();
    }
}
