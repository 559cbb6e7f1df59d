//! Sequence cells for cursor tracking
//!
//! A sequence is a monotonically non-decreasing 64-bit counter identifying a
//! position in the global publication order. Every independently-written
//! cursor sits on its own cache line; false sharing between the write cursor
//! and any consumer cursor would collapse throughput by an order of magnitude.

use crate::engine::INITIAL_SEQUENCE;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicI64, Ordering};

/// An atomic sequence counter occupying a full cache line
///
/// The writer's cursor and every consumer's cursor are `Sequence` cells:
/// written by exactly one role, readable by anyone. The acquire/release pair
/// between a publisher's [`set`](Sequence::set) and an observer's
/// [`get`](Sequence::get) is the only synchronization on the hot path; it is
/// what makes the slot contents behind a published sequence visible.
pub struct Sequence {
    value: CachePadded<AtomicI64>,
}

impl Sequence {
    /// Create a new sequence cell with the given initial value
    pub fn new(initial_value: i64) -> Self {
        Self {
            value: CachePadded::new(AtomicI64::new(initial_value)),
        }
    }

    /// Get the current value with acquire semantics
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Set the value with release semantics
    ///
    /// Callers must only ever store non-decreasing values; every barrier
    /// computation relies on cursors being monotonic.
    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(INITIAL_SEQUENCE)
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence").field("value", &self.get()).finish()
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// A thread-private padded shadow of a sequence value
///
/// Owners keep shadows of their own cursor (to avoid atomic loads of a value
/// only they write) and of remote cursors (to amortize acquire loads across
/// many operations). A shadow is plain memory: it is never shared and never
/// synchronizes anything.
#[derive(Debug)]
pub struct CachedSequence {
    value: CachePadded<i64>,
}

impl CachedSequence {
    /// Create a new shadow with the given starting value
    pub fn new(initial_value: i64) -> Self {
        Self {
            value: CachePadded::new(initial_value),
        }
    }

    /// Get the shadowed value
    #[inline]
    pub fn get(&self) -> i64 {
        *self.value
    }

    /// Replace the shadowed value
    #[inline]
    pub fn set(&mut self, value: i64) {
        *self.value = value;
    }
}

impl Default for CachedSequence {
    fn default() -> Self {
        Self::new(INITIAL_SEQUENCE)
    }
}
