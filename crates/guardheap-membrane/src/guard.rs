//! Guard regions flanking each user-visible block.
//!
//! A guarded block is laid out as
//!
//! ```text
//! raw ─┬─ front guard (GUARD_SIZE bytes of GUARD_PATTERN)
//!      ├─ user view   (requested bytes, handed to the caller)
//!      └─ back guard  (GUARD_SIZE bytes of GUARD_PATTERN)
//! ```
//!
//! Verification compares both regions byte-for-byte against the pattern. A
//! mismatch is reported, never repaired, and never stops the operation that
//! triggered the check.

#![allow(unsafe_code)]

use std::ptr::NonNull;

use serde::{Deserialize, Serialize};

/// Bytes in each guard region.
pub const GUARD_SIZE: usize = 8;

/// Fixed fill written into both guard regions.
pub const GUARD_PATTERN: [u8; GUARD_SIZE] = [0xDE, 0xAD, 0xC0, 0xDE, 0xDE, 0xAD, 0xC0, 0xDE];

/// Guard bytes added to every tracked block (front + back).
pub const GUARD_OVERHEAD: usize = 2 * GUARD_SIZE;

/// Which end of a block a guard region sits at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardRegion {
    Front,
    Back,
}

impl GuardRegion {
    /// Capitalised name used in human-readable diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Front => "Front",
            Self::Back => "Back",
        }
    }
}

/// Outcome of verifying both guard regions of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardCheck {
    Intact,
    FrontCorrupted,
    BackCorrupted,
    BothCorrupted,
}

impl GuardCheck {
    fn from_flags(front_ok: bool, back_ok: bool) -> Self {
        match (front_ok, back_ok) {
            (true, true) => Self::Intact,
            (false, true) => Self::FrontCorrupted,
            (true, false) => Self::BackCorrupted,
            (false, false) => Self::BothCorrupted,
        }
    }

    #[must_use]
    pub const fn is_intact(self) -> bool {
        matches!(self, Self::Intact)
    }

    /// Corrupted regions, front first.
    #[must_use]
    pub const fn corrupted_regions(self) -> &'static [GuardRegion] {
        match self {
            Self::Intact => &[],
            Self::FrontCorrupted => &[GuardRegion::Front],
            Self::BackCorrupted => &[GuardRegion::Back],
            Self::BothCorrupted => &[GuardRegion::Front, GuardRegion::Back],
        }
    }
}

/// Raw block size needed for `user_size` bytes, or `None` if it overflows.
#[must_use]
pub const fn guarded_len(user_size: usize) -> Option<usize> {
    user_size.checked_add(GUARD_OVERHEAD)
}

/// Raw address a user view would have been carved from.
///
/// Pure address arithmetic: no memory is touched, so this is meaningful for
/// foreign and already-released pointers as well.
#[must_use]
pub const fn raw_address_of(user_addr: usize) -> usize {
    user_addr.wrapping_sub(GUARD_SIZE)
}

/// True if `bytes` hold the guard pattern.
#[must_use]
pub fn region_matches(bytes: &[u8; GUARD_SIZE]) -> bool {
    *bytes == GUARD_PATTERN
}

/// The user view inside a guarded raw block.
///
/// # Safety
///
/// `raw` must be valid for at least `GUARD_SIZE` bytes.
#[must_use]
pub unsafe fn user_view(raw: NonNull<u8>) -> NonNull<u8> {
    // SAFETY: the front guard lies inside the block, so the offset stays in bounds.
    unsafe { raw.add(GUARD_SIZE) }
}

/// Write both guard regions around a `user_size`-byte view.
///
/// # Safety
///
/// `raw` must be valid for writes of `user_size + GUARD_OVERHEAD` bytes.
pub unsafe fn write_guards(raw: NonNull<u8>, user_size: usize) {
    // SAFETY: both regions are inside [raw, raw + user_size + GUARD_OVERHEAD).
    unsafe {
        std::ptr::copy_nonoverlapping(GUARD_PATTERN.as_ptr(), raw.as_ptr(), GUARD_SIZE);
        std::ptr::copy_nonoverlapping(
            GUARD_PATTERN.as_ptr(),
            raw.as_ptr().add(GUARD_SIZE + user_size),
            GUARD_SIZE,
        );
    }
}

/// Compare both guard regions against the pattern.
///
/// # Safety
///
/// `raw` must be valid for reads of `user_size + GUARD_OVERHEAD` bytes.
#[must_use]
pub unsafe fn verify_guards(raw: NonNull<u8>, user_size: usize) -> GuardCheck {
    // SAFETY: both regions are inside the block per the caller contract.
    let (front, back) = unsafe {
        (
            read_region(raw.as_ptr()),
            read_region(raw.as_ptr().add(GUARD_SIZE + user_size)),
        )
    };
    GuardCheck::from_flags(region_matches(&front), region_matches(&back))
}

unsafe fn read_region(at: *const u8) -> [u8; GUARD_SIZE] {
    let mut bytes = [0u8; GUARD_SIZE];
    // SAFETY: caller guarantees `at` is readable for GUARD_SIZE bytes.
    unsafe { std::ptr::copy_nonoverlapping(at, bytes.as_mut_ptr(), GUARD_SIZE) };
    bytes
}
