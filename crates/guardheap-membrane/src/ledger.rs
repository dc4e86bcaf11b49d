//! Release ledger: raw addresses returned through the tracked release path.
//!
//! `contains` is the only double-release predicate. An entry is forgotten
//! when the underlying allocator hands the same raw address out again, so
//! ordinary address reuse never reads as a double release.

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct ReleaseLedger {
    released: HashSet<usize>,
}

impl ReleaseLedger {
    #[must_use]
    pub fn contains(&self, raw_addr: usize) -> bool {
        self.released.contains(&raw_addr)
    }

    /// Note a completed tracked release of `raw_addr`.
    pub fn record(&mut self, raw_addr: usize) {
        self.released.insert(raw_addr);
    }

    /// Drop the entry for a reissued address. Returns true if one existed.
    pub fn forget(&mut self, raw_addr: usize) -> bool {
        self.released.remove(&raw_addr)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.released.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.released.is_empty()
    }

    pub fn clear(&mut self) {
        self.released.clear();
    }
}
