//! The single-writer publishing core
//!
//! The writer owns the write cursor and is the only role that ever mutates
//! slots. Publishing is a three-step protocol: reserve a sequence range
//! (spinning against the slowest downstream barrier while the buffer is
//! full), mutate the reserved slots in place, then commit with one release
//! store of the write cursor. The writer reads its own cursor and the
//! downstream barrier through private padded shadows, so a publish that
//! doesn't hit back-pressure performs exactly one atomic store.

use crate::engine::barrier::SequenceBarrier;
use crate::engine::closer::Closer;
use crate::engine::ring_buffer::{split_range, RingBuffer};
use crate::engine::sequence::{CachedSequence, Sequence};
use crate::engine::wait_strategy::WaitStrategy;
use std::sync::Arc;

/// The publishing half of an engine
///
/// Exactly one `Writer` exists per engine and all publishing goes through
/// `&mut self`; the single-writer principle is enforced by the type system
/// rather than by runtime coordination.
///
/// Dropping the writer closes it, so consumers always drain and exit even if
/// [`close`](Writer::close) is never called explicitly.
pub struct Writer<T> {
    buffer: Arc<RingBuffer<T>>,
    capacity: i64,
    /// Shared write cursor; stored to only on commit
    cursor: Arc<Sequence>,
    closer: Arc<Closer>,
    /// Barrier over the tail consumer group. Every earlier tier is at least
    /// as far along, so gating on the tail alone is sufficient.
    slowest_downstream: SequenceBarrier,
    /// Private copy of the write cursor; avoids atomic loads of a value only
    /// this thread ever stores
    shadow: CachedSequence,
    /// Private copy of the last observed downstream minimum; refreshed only
    /// when the cached value says the buffer is full
    cached_slowest: CachedSequence,
    wait_strategy: Arc<dyn WaitStrategy>,
}

impl<T> Writer<T> {
    pub(crate) fn new(
        buffer: Arc<RingBuffer<T>>,
        cursor: Arc<Sequence>,
        closer: Arc<Closer>,
        slowest_downstream: SequenceBarrier,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Self {
        let capacity = buffer.capacity();
        Self {
            buffer,
            capacity,
            cursor,
            closer,
            slowest_downstream,
            shadow: CachedSequence::default(),
            cached_slowest: CachedSequence::default(),
            wait_strategy,
        }
    }

    /// Publish one item, mutating the reserved slot in place
    ///
    /// Blocks (by spinning with the writer wait strategy) while the buffer
    /// is full, i.e. while the slowest consumer is a full lap behind.
    ///
    /// # Arguments
    /// * `f` - Callback writing the item into the slot
    ///
    /// # Panics
    /// Panics with `WriteAfterClose` if the writer has been closed. That is
    /// a bug in calling code, not a recoverable condition.
    pub fn write<F>(&mut self, f: F)
    where
        F: FnOnce(&mut T),
    {
        assert!(
            !self.closer.is_closed(),
            "WriteAfterClose: write() called after close()"
        );
        let next = self.shadow.get() + 1;
        self.reserve(next);
        // SAFETY: the reserve loop guarantees every consumer cursor has
        // passed next - capacity, so no reader can touch this slot until the
        // commit below publishes it.
        unsafe { f(&mut *self.buffer.slot(next)) };
        self.commit(next);
    }

    /// Publish `n` items in one reserve/commit round-trip
    ///
    /// The reserved range is handed to `f` as two contiguous runs: the first
    /// extends toward the end of the buffer, the second (empty unless the
    /// range wraps) starts at slot 0. Together they always hold exactly `n`
    /// slots in publication order.
    ///
    /// # Arguments
    /// * `n` - Number of slots to reserve, `1..=capacity`
    /// * `f` - Callback writing the items into both runs
    ///
    /// # Panics
    /// Panics with `BatchTooLarge` if `n` is zero or exceeds the capacity,
    /// and with `WriteAfterClose` if the writer has been closed.
    pub fn write_batch<F>(&mut self, n: i64, f: F)
    where
        F: FnOnce(&mut [T], &mut [T]),
    {
        assert!(
            !self.closer.is_closed(),
            "WriteAfterClose: write_batch() called after close()"
        );
        assert!(
            n >= 1 && n <= self.capacity,
            "BatchTooLarge: batch of {n} items in a buffer of {}",
            self.capacity
        );
        let current = self.shadow.get();
        let upper = current + n;
        self.reserve(upper);

        let mask = self.buffer.index_mask();
        let first = (current + 1) & mask;
        let last = upper & mask;
        let (len1, len2) = split_range(self.capacity, first, last);
        // SAFETY: the whole range [current + 1, upper] is reserved and
        // uncommitted, and split_range keeps both runs in bounds.
        unsafe {
            f(
                self.buffer.slice_mut(first as usize, len1),
                self.buffer.slice_mut(0, len2),
            )
        };
        self.commit(upper);
    }

    /// Spin until publishing `up_to` would no longer overrun the slowest
    /// consumer
    ///
    /// The cached barrier value answers most calls without touching shared
    /// state; only when it reports the buffer full does the loop re-read the
    /// downstream barrier and, failing that, invoke the wait strategy.
    #[inline]
    fn reserve(&mut self, up_to: i64) {
        if up_to <= self.cached_slowest.get() + self.capacity {
            return;
        }
        let mut spins = 0u64;
        loop {
            let slowest = self.slowest_downstream.load();
            self.cached_slowest.set(slowest);
            if up_to <= slowest + self.capacity {
                return;
            }
            self.wait_strategy.wait(spins);
            spins += 1;
        }
    }

    /// Publish everything up to `sequence` with one release store
    #[inline]
    fn commit(&mut self, sequence: i64) {
        self.cursor.set(sequence);
        self.shadow.set(sequence);
    }

    /// Signal that this writer will never publish again
    ///
    /// Idempotent. Consumers finish draining whatever was published before
    /// the close and then shut down tier by tier.
    pub fn close(&self) {
        if self.closer.close() {
            tracing::debug!(sequence = self.cursor.get(), "writer closed");
        }
    }

    /// True once [`close`](Writer::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    /// The highest sequence published so far
    pub fn sequence(&self) -> i64 {
        self.shadow.get()
    }

    /// The buffer capacity
    pub fn capacity(&self) -> i64 {
        self.capacity
    }
}

impl<T> Drop for Writer<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> std::fmt::Debug for Writer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("capacity", &self.capacity)
            .field("sequence", &self.shadow.get())
            .field("closed", &self.closer.is_closed())
            .finish()
    }
}
