//! Leak and usage reports.

use std::io::{self, Write};

use serde::Serialize;

use crate::registry::AllocationRecord;
use crate::site::OriginSite;
use crate::stats::StatsSnapshot;

const RULE: &str = "----------------------------------------------------";

/// One live block at report time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakEntry {
    pub ptr: usize,
    pub size: usize,
    pub origin: OriginSite,
}

impl From<&AllocationRecord> for LeakEntry {
    fn from(record: &AllocationRecord) -> Self {
        Self {
            ptr: record.user_addr,
            size: record.requested_size,
            origin: record.origin.clone(),
        }
    }
}

/// Machine-readable leak report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakReport {
    pub leaks: Vec<LeakEntry>,
    pub leaked_bytes: usize,
    pub stats: StatsSnapshot,
}

impl LeakReport {
    #[must_use]
    pub fn new(leaks: Vec<LeakEntry>, stats: StatsSnapshot) -> Self {
        let leaked_bytes = leaks
            .iter()
            .fold(0usize, |acc, leak| acc.saturating_add(leak.size));
        Self {
            leaks,
            leaked_bytes,
            stats,
        }
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.leaks.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Render the leak table: a "no leaks" line, or one row per block.
pub fn write_leak_table(out: &mut impl Write, leaks: &[LeakEntry]) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "==== Memory Leak Check ====")?;
    if leaks.is_empty() {
        writeln!(out, "No memory leaks detected.")?;
        return Ok(());
    }
    writeln!(out, "Potential leaks:")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "  Pointer            Size     Location")?;
    writeln!(out, "{RULE}")?;
    for leak in leaks {
        writeln!(
            out,
            "  {:#018x}   {:>6}   {}",
            leak.ptr, leak.size, leak.origin
        )?;
    }
    Ok(())
}

pub fn write_stats(out: &mut impl Write, stats: &StatsSnapshot) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "==== Memory Statistics ====")?;
    writeln!(out, "  Current In-Use:  {} bytes", stats.current_bytes)?;
    writeln!(
        out,
        "  Total Allocated: {} bytes (cumulative)",
        stats.cumulative_bytes
    )?;
    writeln!(out, "  Peak In-Use:     {} bytes", stats.peak_bytes)?;
    writeln!(out, "  Active Blocks:   {}", stats.live_count)
}
