//! Structured diagnostics emitted by the tracker.
//!
//! Every tracked operation produces a [`DiagnosticRecord`]: successful paths
//! at `Trace`, fall-backs and refusals at `Warn`, detected memory errors at
//! `Error`. Records are filtered by the configured minimum level and handed
//! to a [`DiagnosticSink`]:
//!
//! - [`StderrSink`]: one human-readable line per record (the default).
//! - [`JsonlSink`]: one JSON object per line, for log pipelines.
//! - [`CaptureSink`]: in-memory, drainable; used by tests.
//! - [`NullSink`]: discards everything.
//!
//! Sinks are invoked while the tracker holds its lock and must not call back
//! into the tracker.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::guard::GuardRegion;
use crate::site::OriginSite;

/// Severity of a diagnostic record.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl DiagnosticLevel {
    /// Parse a level name (case-insensitive). Unknown names yield `None`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" | "all" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" | "err" => Some(Self::Error),
            _ => None,
        }
    }

    /// Upper-case label used by [`StderrSink`].
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Classified fault carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Resize/release of a pointer the registry does not know.
    UnknownPointer,
    /// Release of a raw address already in the release ledger.
    DoubleRelease,
    /// Resize of a pointer whose block was already released.
    ResizeAfterRelease,
    /// A guard region no longer holds the pattern.
    GuardCorruption,
    /// The underlying allocator refused a request.
    OutOfMemory,
    /// `count * element_size` overflowed.
    CountOverflow,
    /// Statistics would have gone negative; recovered by clamping.
    AccountingUnderflow,
}

/// One structured diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticRecord {
    /// Monotonic per-tracker id.
    pub decision_id: u64,
    /// Correlation id (`guardheap::<symbol>::<decision_id>`).
    pub trace_id: String,
    pub level: DiagnosticLevel,
    /// Operation (`allocate`, `allocate_zeroed`, `resize`, `release`, ...).
    pub symbol: &'static str,
    /// Event name (`alloc`, `double_release`, `guard_corrupted`, ...).
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<DiagnosticKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<GuardRegion>,
    /// User-visible pointer involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ptr: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    /// Site of the operation that produced this record.
    pub site: OriginSite,
    /// Allocation site of the block involved, when it is tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<OriginSite>,
    /// Machine-readable outcome label (`success`, `ignored`, `passthrough`, ...).
    pub outcome: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl DiagnosticRecord {
    #[must_use]
    pub fn new(
        decision_id: u64,
        level: DiagnosticLevel,
        symbol: &'static str,
        event: &'static str,
        site: OriginSite,
    ) -> Self {
        Self {
            decision_id,
            trace_id: format!("guardheap::{symbol}::{decision_id:016x}"),
            level,
            symbol,
            event,
            kind: None,
            region: None,
            ptr: None,
            size: None,
            site,
            origin: None,
            outcome: "success",
            message: String::new(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: DiagnosticKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: GuardRegion) -> Self {
        self.region = Some(region);
        self
    }

    #[must_use]
    pub fn with_ptr(mut self, ptr: usize) -> Self {
        self.ptr = Some(ptr);
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: OriginSite) -> Self {
        self.origin = Some(origin);
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: &'static str) -> Self {
        self.outcome = outcome;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// `LEVEL: message`, falling back to the event name when no message was set.
    #[must_use]
    pub fn human_line(&self) -> String {
        if self.message.is_empty() {
            format!("{}: {} at {}", self.level.label(), self.event, self.site)
        } else {
            format!("{}: {}", self.level.label(), self.message)
        }
    }
}

/// Destination for diagnostic records.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, record: &DiagnosticRecord);
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Arc<T> {
    fn record(&self, record: &DiagnosticRecord) {
        (**self).record(record);
    }
}

/// Writes [`DiagnosticRecord::human_line`] to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn record(&self, record: &DiagnosticRecord) {
        // Diagnostics must never take the host down; a closed stderr is ignored.
        let _ = writeln!(std::io::stderr().lock(), "{}", record.human_line());
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&self, _record: &DiagnosticRecord) {}
}

/// Writes one JSON object per record.
pub struct JsonlSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlSink<W> {
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer (e.g. a `Vec<u8>` in tests).
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    /// Flush the underlying writer.
    pub fn flush(&self) -> std::io::Result<()> {
        self.writer.lock().flush()
    }
}

impl<W: Write + Send> DiagnosticSink for JsonlSink<W> {
    fn record(&self, record: &DiagnosticRecord) {
        let Ok(line) = record.to_jsonl() else {
            return;
        };
        let _ = writeln!(self.writer.lock(), "{line}");
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct CaptureSink {
    records: Mutex<Vec<DiagnosticRecord>>,
}

impl CaptureSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every captured record.
    pub fn drain(&self) -> Vec<DiagnosticRecord> {
        std::mem::take(&mut *self.records.lock())
    }

    /// Copy of the captured records.
    #[must_use]
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().clone()
    }

    /// Number of captured records carrying `kind`.
    #[must_use]
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.kind == Some(kind))
            .count()
    }
}

impl DiagnosticSink for CaptureSink {
    fn record(&self, record: &DiagnosticRecord) {
        self.records.lock().push(record.clone());
    }
}
