//! Tracker configuration.
//!
//! [`TrackerConfig::from_env`] reads two variables:
//! - `GUARDHEAP_MODE`: `full` (default) instruments every operation; `off`
//!   passes straight through to the underlying allocator with no guards,
//!   registry, ledger or statistics. Off exists for benchmarking baselines.
//! - `GUARDHEAP_LOG`: minimum level forwarded to the diagnostic sink
//!   (`trace`, `debug`, `info`, `warn`, `error`; default `warn`).

use crate::diagnostics::DiagnosticLevel;

/// Whether operations are instrumented.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackingMode {
    /// Guard regions, registry, release ledger and statistics.
    #[default]
    Full,
    /// Pure pass-through. Only count-overflow checking remains.
    Off,
}

impl TrackingMode {
    /// Parse from string (case-insensitive). Unknown values select the default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" | "on" | "track" | "default" => Self::Full,
            "off" | "none" | "disabled" | "passthrough" => Self::Off,
            _ => Self::Full,
        }
    }

    #[must_use]
    pub const fn tracking_enabled(self) -> bool {
        matches!(self, Self::Full)
    }
}

/// Runtime knobs for a [`crate::Tracker`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    pub mode: TrackingMode,
    /// Records below this level are not forwarded to the sink.
    pub min_level: DiagnosticLevel,
}

impl TrackerConfig {
    pub const MODE_VAR: &'static str = "GUARDHEAP_MODE";
    pub const LOG_VAR: &'static str = "GUARDHEAP_LOG";

    /// Configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mode = lookup(Self::MODE_VAR)
            .map(|v| TrackingMode::from_str_loose(&v))
            .unwrap_or_default();
        let min_level = lookup(Self::LOG_VAR)
            .and_then(|v| DiagnosticLevel::from_str_loose(&v))
            .unwrap_or_default();
        Self { mode, min_level }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: TrackingMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_min_level(mut self, min_level: DiagnosticLevel) -> Self {
        self.min_level = min_level;
        self
    }
}
