//! Debug allocation membrane for guardheap.
//!
//! This crate sits between a program's allocation calls and the underlying
//! allocator and instruments every block: guard regions flank each user view,
//! a registry remembers where each live block came from, a release ledger
//! catches double releases, and running statistics track usage.
//!
//! # Architecture
//!
//! The membrane consists of:
//! - **Guard codec** (`guard`): fixed-pattern regions before and after each view
//! - **Allocation registry** (`registry`): live blocks keyed by user pointer
//! - **Release ledger** (`ledger`): raw addresses released through the tracker
//! - **Statistics** (`stats`): cumulative/current/peak bytes, live count, fault tallies
//! - **Concurrency guard** (`lock`): one coarse mutex, or none for single-threaded hosts
//! - **Tracker** (`tracker`): the operations tying the above together
//! - **Reporting** (`report`): leak tables and usage summaries
//! - **Diagnostics** (`diagnostics`): structured records and sinks
//! - **Configuration** (`config`): environment-driven mode and log level
//! - **Underlying allocator** (`heap`): the `malloc`-style seam
//!
//! ```no_run
//! use guardheap_membrane::{OriginSite, Tracker};
//!
//! let tracker = Tracker::new();
//! let block = tracker.allocate(64, OriginSite::caller()).unwrap();
//! // SAFETY: `block` came from this tracker.
//! unsafe { tracker.release(Some(block), OriginSite::caller()) };
//! tracker.dump_leaks(&mut std::io::stdout()).unwrap();
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod guard;
pub mod heap;
pub mod ledger;
pub mod lock;
pub mod registry;
pub mod report;
pub mod site;
pub mod stats;
pub mod tracker;

pub use config::{TrackerConfig, TrackingMode};
pub use diagnostics::{
    CaptureSink, DiagnosticKind, DiagnosticLevel, DiagnosticRecord, DiagnosticSink, JsonlSink,
    NullSink, StderrSink,
};
pub use error::TrackerError;
pub use guard::{GUARD_PATTERN, GUARD_SIZE, GuardCheck, GuardRegion};
pub use heap::{RawAllocator, SystemHeap};
pub use lock::{CoarseLock, ConcurrencyGuard, NoLock};
pub use report::{LeakEntry, LeakReport};
pub use site::OriginSite;
pub use stats::{FaultCounts, StatsSnapshot};
pub use tracker::{ReleaseOutcome, Tracker};
