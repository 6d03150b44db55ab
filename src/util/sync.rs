use crate::errors::{AccessError, ReadResult};
use std::sync::atomic::{AtomicBool, Ordering};

/// Marks a resource or container as closed.
///
/// Once closed, a flag never reopens.
#[derive(Debug, Default)]
pub(crate) struct CloseFlag(AtomicBool);

impl CloseFlag {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this call closed the flag,
    /// and `false` if it was already closed.
    pub(crate) fn close(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> ReadResult<()> {
        if self.is_closed() {
            Err(AccessError::Closed.into())
        } else {
            Ok(())
        }
    }
}
