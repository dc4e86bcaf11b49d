//! Allocation registry: one record per live user-visible pointer.

#![allow(unsafe_code)]

use std::collections::HashMap;
use std::ptr::NonNull;

use crate::site::OriginSite;

/// Owning handle to a raw block obtained from the underlying allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPtr(NonNull<u8>);

// SAFETY: a BlockPtr is only dereferenced by the tracker while it holds its
// state guard, so moving the handle between threads cannot race.
unsafe impl Send for BlockPtr {}

impl BlockPtr {
    #[must_use]
    pub const fn new(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }

    #[must_use]
    pub const fn as_non_null(self) -> NonNull<u8> {
        self.0
    }

    #[must_use]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}

/// Metadata for one live tracked block.
#[derive(Debug, Clone)]
pub struct AllocationRecord {
    /// Allocation order; kept across resize.
    pub serial: u64,
    pub raw: BlockPtr,
    /// Address handed to the caller (`raw + GUARD_SIZE`).
    pub user_addr: usize,
    /// Bytes the caller asked for (never zero).
    pub requested_size: usize,
    pub origin: OriginSite,
}

#[derive(Debug, Default)]
pub struct Registry {
    records: HashMap<usize, AllocationRecord>,
    next_serial: u64,
}

impl Registry {
    /// Register a fresh block and return its serial.
    pub fn insert(
        &mut self,
        raw: BlockPtr,
        user_addr: usize,
        requested_size: usize,
        origin: OriginSite,
    ) -> u64 {
        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1);
        self.records.insert(
            user_addr,
            AllocationRecord {
                serial,
                raw,
                user_addr,
                requested_size,
                origin,
            },
        );
        serial
    }

    #[must_use]
    pub fn get(&self, user_addr: usize) -> Option<&AllocationRecord> {
        self.records.get(&user_addr)
    }

    #[must_use]
    pub fn contains(&self, user_addr: usize) -> bool {
        self.records.contains_key(&user_addr)
    }

    pub fn remove(&mut self, user_addr: usize) -> Option<AllocationRecord> {
        self.records.remove(&user_addr)
    }

    /// Move a record to its resized block, keeping serial and origin.
    ///
    /// Returns the previous requested size, or `None` if `old_user` is not
    /// registered.
    pub fn relocate(
        &mut self,
        old_user: usize,
        raw: BlockPtr,
        new_user: usize,
        new_size: usize,
    ) -> Option<usize> {
        let mut record = self.records.remove(&old_user)?;
        let old_size = record.requested_size;
        record.raw = raw;
        record.user_addr = new_user;
        record.requested_size = new_size;
        self.records.insert(new_user, record);
        Some(old_size)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Live records, oldest first.
    #[must_use]
    pub fn ordered(&self) -> Vec<&AllocationRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_unstable_by_key(|r| r.serial);
        records
    }

    /// Remove every record, oldest first.
    pub fn drain(&mut self) -> Vec<AllocationRecord> {
        let mut records: Vec<_> = self.records.drain().map(|(_, r)| r).collect();
        records.sort_unstable_by_key(|r| r.serial);
        records
    }
}
