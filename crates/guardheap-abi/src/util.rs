//! Conversions between C arguments and membrane types.

use std::ffi::{CStr, c_char, c_int, c_void};
use std::io;
use std::ptr::NonNull;

use guardheap_membrane::OriginSite;

/// Origin site for a `__FILE__`/`__LINE__` pair. A null file yields `<unknown>`.
///
/// # Safety
///
/// `file` must be null or a NUL-terminated string.
pub(crate) unsafe fn origin_site(file: *const c_char, line: c_int) -> OriginSite {
    if file.is_null() {
        return OriginSite::unknown();
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    let name = unsafe { CStr::from_ptr(file) }.to_string_lossy().into_owned();
    OriginSite::new(name, u32::try_from(line).unwrap_or(0))
}

pub(crate) fn non_null(ptr: *mut c_void) -> Option<NonNull<u8>> {
    NonNull::new(ptr.cast::<u8>())
}

pub(crate) fn into_raw(ptr: Option<NonNull<u8>>) -> *mut c_void {
    ptr.map_or(std::ptr::null_mut(), |p| p.as_ptr().cast())
}

/// `io::Write` over a C `FILE*`, so reports interleave with the caller's
/// own stdio output.
pub(crate) struct CStream(NonNull<libc::FILE>);

impl CStream {
    pub(crate) fn new(stream: *mut libc::FILE) -> Option<Self> {
        NonNull::new(stream).map(Self)
    }
}

impl io::Write for CStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: the stream is a live FILE* supplied by the caller.
        let written = unsafe { libc::fwrite(buf.as_ptr().cast(), 1, buf.len(), self.0.as_ptr()) };
        if written == 0 && !buf.is_empty() {
            return Err(io::Error::other("fwrite wrote nothing"));
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        // SAFETY: the stream is a live FILE* supplied by the caller.
        if unsafe { libc::fflush(self.0.as_ptr()) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}
