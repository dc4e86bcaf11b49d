use guardheap_membrane::{NullSink, OriginSite, ReleaseOutcome, Tracker};
use std::sync::Arc;
use std::thread;

#[test]
fn coarse_lock_keeps_statistics_consistent_across_threads() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 500;

    let tracker = Arc::new(Tracker::new().with_sink(NullSink));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                let mut held = Vec::new();
                for round in 0..ROUNDS {
                    let size = 1 + (t * 31 + round * 7) % 512;
                    let site = OriginSite::new("worker", t as u32);
                    let ptr = tracker.allocate(size, site).expect("allocate");
                    held.push(ptr);
                    if round % 3 == 2 {
                        for ptr in held.drain(..) {
                            // SAFETY: ptr is a live view owned by this thread.
                            let outcome =
                                unsafe { tracker.release(Some(ptr), OriginSite::tag("worker")) };
                            assert_eq!(outcome, ReleaseOutcome::Released);
                        }
                    }
                }
                held.len()
            })
        })
        .collect();

    let still_held: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    let expected_cumulative: usize = (0..THREADS)
        .flat_map(|t| (0..ROUNDS).map(move |round| 1 + (t * 31 + round * 7) % 512))
        .sum();
    let snap = tracker.snapshot_stats();
    assert_eq!(snap.cumulative_bytes, expected_cumulative);
    assert_eq!(snap.live_count, still_held);
    assert_eq!(tracker.leaks().len(), still_held);
    assert!(snap.peak_bytes >= snap.current_bytes);
    assert_eq!(tracker.fault_counts().total(), 0);

    assert_eq!(tracker.release_all_tracked(), still_held);
    assert_eq!(tracker.snapshot_stats().live_count, 0);
}

#[test]
fn concurrent_double_release_is_reported_exactly_once_per_extra_call() {
    const THREADS: usize = 4;

    let tracker = Arc::new(Tracker::new().with_sink(NullSink));
    let ptr = tracker.allocate(64, OriginSite::tag("shared")).unwrap();
    let addr = ptr.as_ptr() as usize;

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                let ptr = std::ptr::NonNull::new(addr as *mut u8);
                // SAFETY: the block was obtained from this tracker; every call
                // after the first is caught by the release ledger.
                unsafe { tracker.release(ptr, OriginSite::tag("racer")) }
            })
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let released = outcomes
        .iter()
        .filter(|o| **o == ReleaseOutcome::Released)
        .count();
    assert_eq!(released, 1);
    assert_eq!(
        tracker.fault_counts().double_release,
        (THREADS - 1) as u64
    );
    assert_eq!(tracker.snapshot_stats().live_count, 0);
}
