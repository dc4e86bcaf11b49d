//! Underlying allocator seam.
//!
//! The tracker never manufactures memory itself; it asks a [`RawAllocator`]
//! for guarded blocks and hands every untracked pointer straight back to it.
//! Because untracked fall-back paths must resize or release pointers whose
//! layout is unknown, the default backend is the C heap rather than
//! `std::alloc`.

#![allow(unsafe_code)]

use std::ptr::NonNull;
use std::sync::Arc;

/// A layout-free allocator in the `malloc`/`realloc`/`free` mould.
///
/// # Safety
///
/// Implementations must return blocks that are valid for reads and writes of
/// the requested size and aligned for any fundamental type. `resize` must
/// preserve the first `min(old, new)` bytes and, on failure, leave the
/// original block untouched.
pub unsafe trait RawAllocator: Send + Sync {
    /// Obtain `size` bytes. `None` when the request is refused.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Resize a block to `new_size` bytes, possibly moving it.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live block obtained from this allocator.
    unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>>;

    /// Return a block.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live block obtained from this allocator; it is dead
    /// afterwards.
    unsafe fn release(&self, ptr: NonNull<u8>);
}

/// The process C heap (`malloc`, `realloc`, `free`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SystemHeap;

// SAFETY: malloc/realloc/free uphold the trait contract; the C heap is
// thread-safe.
unsafe impl RawAllocator for SystemHeap {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: malloc has no preconditions.
        NonNull::new(unsafe { libc::malloc(size) }.cast::<u8>())
    }

    unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>> {
        // SAFETY: caller guarantees `ptr` came from this heap and is live.
        NonNull::new(unsafe { libc::realloc(ptr.as_ptr().cast(), new_size) }.cast::<u8>())
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: caller guarantees `ptr` came from this heap and is live.
        unsafe { libc::free(ptr.as_ptr().cast()) }
    }
}

// SAFETY: forwards to the shared allocator, which upholds the contract.
unsafe impl<A: RawAllocator + ?Sized> RawAllocator for Arc<A> {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        (**self).allocate(size)
    }

    unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>> {
        // SAFETY: same contract as the inner allocator.
        unsafe { (**self).resize(ptr, new_size) }
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: same contract as the inner allocator.
        unsafe { (**self).release(ptr) }
    }
}
