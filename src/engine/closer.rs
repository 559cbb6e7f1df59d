//! Close flags for graceful shutdown propagation
//!
//! Every publishing role (the writer and each consumer) owns a close flag.
//! Closure flows down the pipeline: the writer closes first; a consumer
//! closes only after it has drained everything its closed upstream published.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicBool, Ordering};

/// A padded, monotonic open/closed flag
///
/// The flag only ever moves from open to closed. A role sets its own flag
/// exactly once; anyone downstream may observe it.
#[derive(Default)]
pub struct Closer {
    closed: CachePadded<AtomicBool>,
}

impl Closer {
    /// Create a new flag in the open state
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the owning role has ceased publishing
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Transition to closed
    ///
    /// Idempotent; returns true only for the call that performed the
    /// transition. The release ordering makes every publish the owner made
    /// visible to any observer whose acquire load sees the flag set.
    #[inline]
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for Closer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Closer")
            .field("closed", &self.is_closed())
            .finish()
    }
}
