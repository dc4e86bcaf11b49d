// All extern "C" exports accept raw pointers from C callers and document
// their contract on the entry point itself.
#![allow(clippy::missing_safety_doc)]
//! # guardheap-abi
//!
//! extern "C" boundary for guardheap.
//!
//! This crate produces a `cdylib` exposing `guardheap_*` symbols that C code
//! calls in place of `malloc`/`calloc`/`realloc`/`free`, passing `__FILE__`
//! and `__LINE__` so every block remembers where it came from. All entry
//! points share one process-wide tracker configured from the environment
//! (`GUARDHEAP_MODE`, `GUARDHEAP_LOG`).
//!
//! ```text
//! C caller -> guardheap_* entry (this crate) -> Tracker -> C heap
//! ```
//!
//! Entry points never abort: allocation failures return null and misuse is
//! reported on stderr.

mod tracker_state;
mod util;

pub mod malloc_abi;
pub mod report_abi;

pub use report_abi::GuardheapStats;
