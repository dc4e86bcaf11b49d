use guardheap_membrane::{
    CaptureSink, DiagnosticKind, OriginSite, ReleaseOutcome, StatsSnapshot, Tracker,
};
use std::ptr::NonNull;
use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn gen_range_usize(&mut self, low: usize, high_inclusive: usize) -> usize {
        assert!(low <= high_inclusive);
        let span = high_inclusive - low + 1;
        low + (self.next_u64() as usize % span)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Empty,
    Live(NonNull<u8>, usize),
    Released(NonNull<u8>),
}

#[derive(Debug, Default)]
struct Model {
    cumulative: usize,
    current: usize,
    peak: usize,
    live: usize,
}

impl Model {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cumulative_bytes: self.cumulative,
            current_bytes: self.current,
            peak_bytes: self.peak,
            live_count: self.live,
        }
    }

    fn allocated(&mut self, size: usize) {
        self.cumulative += size;
        self.current += size;
        self.live += 1;
        self.peak = self.peak.max(self.current);
    }

    fn resized(&mut self, old: usize, new: usize) {
        if new > old {
            self.cumulative += new - old;
        }
        self.current = self.current + new - old;
        self.peak = self.peak.max(self.current);
    }

    fn released(&mut self, size: usize) {
        self.current -= size;
        self.live -= 1;
    }
}

fn fill(ptr: NonNull<u8>, len: usize, byte: u8) {
    // SAFETY: callers pass a live tracked view of at least `len` bytes.
    unsafe { std::ptr::write_bytes(ptr.as_ptr(), byte, len) };
}

fn check_fill(ptr: NonNull<u8>, len: usize, byte: u8) -> bool {
    // SAFETY: callers pass a live tracked view of at least `len` bytes.
    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) };
    bytes.iter().all(|&b| b == byte)
}

#[test]
fn deterministic_sequences_keep_statistics_exact() {
    // Invariant pressure over a bounded slot table, not a fuzz campaign.
    const SEEDS: [u64; 4] = [1, 2, 3, 4];
    const STEPS: usize = 2_000;
    const SLOTS: usize = 32;

    for seed in SEEDS {
        let sink = Arc::new(CaptureSink::new());
        let tracker = Tracker::new().with_sink(sink.clone());
        let mut rng = XorShift64::new(seed);
        let mut slots = [Slot::Empty; SLOTS];
        let mut model = Model::default();
        let mut double_releases = 0_u64;

        for step in 0..STEPS {
            let op = rng.gen_range_usize(0, 99);
            let idx = rng.gen_range_usize(0, SLOTS - 1);
            let site = OriginSite::new("sequence", step as u32);
            let tag = (idx as u8).wrapping_add(1);

            match (op, slots[idx]) {
                // allocate
                (0..=44, Slot::Empty | Slot::Released(_)) => {
                    let size = rng.gen_range_usize(0, 2048);
                    let ptr = tracker.allocate(size, site).expect("allocate");
                    let size = size.max(1);
                    fill(ptr, size, tag);
                    slots[idx] = Slot::Live(ptr, size);
                    model.allocated(size);
                }
                // resize
                (45..=64, Slot::Live(ptr, old)) => {
                    let new = rng.gen_range_usize(1, 4096);
                    // SAFETY: ptr is a live tracked view.
                    let moved = unsafe { tracker.resize(Some(ptr), new, site) }
                        .expect("resize")
                        .expect("non-zero resize keeps a block");
                    assert!(
                        check_fill(moved, old.min(new), tag),
                        "seed={seed} step={step}: resize lost content"
                    );
                    fill(moved, new, tag);
                    slots[idx] = Slot::Live(moved, new);
                    model.resized(old, new);
                }
                // release
                (65..=89, Slot::Live(ptr, size)) => {
                    assert!(check_fill(ptr, size, tag), "seed={seed} step={step}");
                    // SAFETY: ptr is a live tracked view.
                    let outcome = unsafe { tracker.release(Some(ptr), site) };
                    assert_eq!(outcome, ReleaseOutcome::Released, "seed={seed} step={step}");
                    slots[idx] = Slot::Released(ptr);
                    model.released(size);
                }
                // release again, unless the address now belongs to another slot
                (90..=99, Slot::Released(ptr)) if !tracker.is_tracked(ptr) => {
                    // SAFETY: ptr was released through this tracker.
                    let outcome = unsafe { tracker.release(Some(ptr), site) };
                    assert_eq!(
                        outcome,
                        ReleaseOutcome::DoubleRelease,
                        "seed={seed} step={step}"
                    );
                    double_releases += 1;
                }
                _ => continue,
            }

            assert_eq!(
                tracker.snapshot_stats(),
                model.snapshot(),
                "seed={seed} step={step}: statistics drifted from model"
            );
        }

        let leaks = tracker.leaks();
        assert_eq!(leaks.len(), model.live, "seed={seed}");
        assert_eq!(
            leaks.iter().map(|l| l.size).sum::<usize>(),
            model.current,
            "seed={seed}"
        );

        for slot in slots {
            if let Slot::Live(ptr, _) = slot {
                // SAFETY: ptr is a live tracked view.
                unsafe { tracker.release(Some(ptr), OriginSite::tag("cleanup")) };
            }
        }
        let end = tracker.snapshot_stats();
        assert_eq!(end.live_count, 0, "seed={seed}");
        assert_eq!(end.current_bytes, 0, "seed={seed}");
        assert_eq!(end.peak_bytes, model.peak, "seed={seed}");
        assert!(tracker.leaks().is_empty(), "seed={seed}");

        assert_eq!(tracker.fault_counts().double_release, double_releases);
        assert_eq!(tracker.fault_counts().guard_corruption, 0);
        assert_eq!(tracker.fault_counts().unknown_pointer, 0);
        assert_eq!(
            sink.count(DiagnosticKind::DoubleRelease) as u64,
            double_releases
        );
    }
}

#[test]
fn n_blocks_of_s_bytes_sum_exactly() {
    const N: usize = 50;
    const S: usize = 24;

    let tracker = Tracker::new().with_sink(guardheap_membrane::NullSink);
    let blocks: Vec<_> = (0..N)
        .map(|i| tracker.allocate(S, OriginSite::new("bulk", i as u32)).unwrap())
        .collect();
    assert_eq!(tracker.snapshot_stats().current_bytes, N * S);
    assert_eq!(tracker.snapshot_stats().live_count, N);

    let mut peak_seen = 0;
    for ptr in blocks {
        // SAFETY: each pointer is a live tracked view.
        unsafe { tracker.release(Some(ptr), OriginSite::tag("bulk")) };
        let peak = tracker.snapshot_stats().peak_bytes;
        assert!(peak >= peak_seen);
        peak_seen = peak;
    }
    let snap = tracker.snapshot_stats();
    assert_eq!(snap.current_bytes, 0);
    assert_eq!(snap.peak_bytes, N * S);
    assert_eq!(snap.cumulative_bytes, N * S);
}
