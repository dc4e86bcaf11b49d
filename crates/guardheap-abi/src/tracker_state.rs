//! Process-wide tracker shared by every ABI entry point.

use std::sync::OnceLock;

use guardheap_membrane::{Tracker, TrackerConfig};

static TRACKER: OnceLock<Tracker> = OnceLock::new();

/// The global tracker, created on first use from the environment.
pub(crate) fn global_tracker() -> &'static Tracker {
    TRACKER.get_or_init(|| Tracker::new().with_config(TrackerConfig::from_env()))
}
