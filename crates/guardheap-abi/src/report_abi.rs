//! Leak and statistics reporting entry points.

use std::io::{self, Write};

use guardheap_membrane::StatsSnapshot;

use crate::tracker_state::global_tracker;
use crate::util::CStream;

/// Usage counters in C layout.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GuardheapStats {
    /// Bytes ever requested (cumulative).
    pub total_allocated: usize,
    /// Bytes currently in use.
    pub current_allocated: usize,
    /// High-water mark of `current_allocated`.
    pub peak_allocated: usize,
    /// Live blocks.
    pub allocation_count: usize,
}

impl From<StatsSnapshot> for GuardheapStats {
    fn from(snap: StatsSnapshot) -> Self {
        Self {
            total_allocated: snap.cumulative_bytes,
            current_allocated: snap.current_bytes,
            peak_allocated: snap.peak_bytes,
            allocation_count: snap.live_count,
        }
    }
}

/// Run `render` against `out`, or stderr when `out` is null. Write errors
/// are dropped: these entry points return nothing.
fn with_stream(out: *mut libc::FILE, render: impl FnOnce(&mut dyn Write) -> io::Result<()>) {
    let _ = match CStream::new(out) {
        Some(mut stream) => render(&mut stream).and_then(|()| stream.flush()),
        None => render(&mut io::stderr().lock()),
    };
}

/// Print every live block (pointer, size, allocation site) to `out`.
///
/// # Safety
///
/// `out` must be null or an open, writable `FILE*`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn guardheap_log_leaks(out: *mut libc::FILE) {
    with_stream(out, |mut w| global_tracker().dump_leaks(&mut w));
}

/// Print the usage counters to `out`.
///
/// # Safety
///
/// `out` must be null or an open, writable `FILE*`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn guardheap_log_stats(out: *mut libc::FILE) {
    with_stream(out, |mut w| global_tracker().dump_stats(&mut w));
}

/// Copy the usage counters into `*stats`. Null is a no-op.
///
/// # Safety
///
/// `stats` must be null or valid for a write of `GuardheapStats`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn guardheap_get_stats(stats: *mut GuardheapStats) {
    if stats.is_null() {
        return;
    }
    let snap = GuardheapStats::from(global_tracker().snapshot_stats());
    // SAFETY: non-null and writable per the caller contract.
    unsafe { stats.write(snap) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_maps_field_by_field() {
        let stats = GuardheapStats::from(StatsSnapshot {
            cumulative_bytes: 30,
            current_bytes: 20,
            peak_bytes: 25,
            live_count: 2,
        });
        assert_eq!(
            stats,
            GuardheapStats {
                total_allocated: 30,
                current_allocated: 20,
                peak_allocated: 25,
                allocation_count: 2,
            }
        );
    }

    #[test]
    fn c_layout_is_four_words() {
        assert_eq!(
            std::mem::size_of::<GuardheapStats>(),
            4 * std::mem::size_of::<usize>()
        );
    }
}
