//! Tracked allocation entry points.
//!
//! Each call carries the caller's `__FILE__`/`__LINE__`. Failures return
//! null; misuse (unknown pointers, double release, guard corruption) is
//! reported by the tracker and resolved without aborting the host.

use std::ffi::{c_char, c_int, c_void};

use crate::tracker_state::global_tracker;
use crate::util::{into_raw, non_null, origin_site};

// ---------------------------------------------------------------------------
// malloc
// ---------------------------------------------------------------------------

/// Tracked `malloc`. A zero size is treated as one byte.
///
/// # Safety
///
/// `file` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn guardheap_malloc(
    size: usize,
    file: *const c_char,
    line: c_int,
) -> *mut c_void {
    // SAFETY: forwarded caller contract.
    let site = unsafe { origin_site(file, line) };
    into_raw(global_tracker().allocate(size, site).ok())
}

// ---------------------------------------------------------------------------
// calloc
// ---------------------------------------------------------------------------

/// Tracked `calloc`. Returns null without allocating if `nmemb * size`
/// overflows.
///
/// # Safety
///
/// `file` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn guardheap_calloc(
    nmemb: usize,
    size: usize,
    file: *const c_char,
    line: c_int,
) -> *mut c_void {
    // SAFETY: forwarded caller contract.
    let site = unsafe { origin_site(file, line) };
    into_raw(global_tracker().allocate_zeroed(nmemb, size, site).ok())
}

// ---------------------------------------------------------------------------
// realloc
// ---------------------------------------------------------------------------

/// Tracked `realloc`.
///
/// Null `ptr` allocates; zero `size` releases and returns null. On failure
/// null is returned and `ptr` stays valid.
///
/// # Safety
///
/// `ptr` must be null, a pointer from these entry points, or a pointer from
/// the C heap. `file` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn guardheap_realloc(
    ptr: *mut c_void,
    size: usize,
    file: *const c_char,
    line: c_int,
) -> *mut c_void {
    // SAFETY: forwarded caller contract.
    let site = unsafe { origin_site(file, line) };
    // SAFETY: forwarded caller contract.
    match unsafe { global_tracker().resize(non_null(ptr), size, site) } {
        Ok(moved) => into_raw(moved),
        Err(_) => std::ptr::null_mut(),
    }
}

// ---------------------------------------------------------------------------
// free
// ---------------------------------------------------------------------------

/// Tracked `free`. Null is a no-op; a second release is reported and ignored.
///
/// # Safety
///
/// `ptr` must be null, a pointer from these entry points, or a pointer from
/// the C heap. `file` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn guardheap_free(ptr: *mut c_void, file: *const c_char, line: c_int) {
    let Some(ptr) = non_null(ptr) else {
        return;
    };
    // SAFETY: forwarded caller contract.
    let site = unsafe { origin_site(file, line) };
    // SAFETY: forwarded caller contract.
    unsafe { global_tracker().release(Some(ptr), site) };
}

/// Release every tracked block and reset all counters.
///
/// Intended for test teardown: pointers handed out earlier become dangling.
#[unsafe(no_mangle)]
pub extern "C" fn guardheap_free_all_tracked() {
    global_tracker().release_all_tracked();
}
