//! Failures surfaced to callers of the tracker.
//!
//! Only conditions the caller must handle are errors. Unknown pointers,
//! double releases and guard corruption are diagnostics with a defined
//! fallback (see [`crate::diagnostics::DiagnosticKind`]).

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// The underlying allocator refused the request, or the guarded size
    /// (`requested + 2 * GUARD_SIZE`) is not representable.
    #[error("out of memory: {requested} bytes could not be obtained")]
    OutOfMemory { requested: usize },
    /// `count * element_size` overflowed `usize`; nothing was allocated.
    #[error("count overflow: {count} x {element_size} bytes exceeds the address space")]
    CountOverflow { count: usize, element_size: usize },
    /// Resize was requested on a pointer whose block was already released
    /// through the tracker. Forwarding it would hand a dangling pointer to
    /// the underlying allocator, so the request is refused.
    #[error("pointer {ptr:#x} was already released")]
    ReleasedPointer { ptr: usize },
}

impl TrackerError {
    /// Bytes the failed request asked for, when the error carries a size.
    #[must_use]
    pub const fn requested(&self) -> Option<usize> {
        match self {
            Self::OutOfMemory { requested } => Some(*requested),
            Self::CountOverflow { .. } | Self::ReleasedPointer { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_quantities() {
        let oom = TrackerError::OutOfMemory { requested: 4096 };
        assert_eq!(oom.to_string(), "out of memory: 4096 bytes could not be obtained");

        let overflow = TrackerError::CountOverflow {
            count: usize::MAX,
            element_size: 2,
        };
        assert!(overflow.to_string().contains(&usize::MAX.to_string()));

        let released = TrackerError::ReleasedPointer { ptr: 0x1000 };
        assert_eq!(released.to_string(), "pointer 0x1000 was already released");
    }

    #[test]
    fn requested_only_for_out_of_memory() {
        assert_eq!(
            TrackerError::OutOfMemory { requested: 7 }.requested(),
            Some(7)
        );
        assert_eq!(
            TrackerError::CountOverflow {
                count: 2,
                element_size: 3
            }
            .requested(),
            None
        );
    }
}
