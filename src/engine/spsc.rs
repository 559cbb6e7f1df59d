//! Single-producer/single-consumer degenerate ring
//!
//! When there is exactly one consumer and no pipeline, the full engine is
//! overkill: two cursors over one buffer are enough, and close propagation
//! disappears. This module provides that degenerate case with non-blocking
//! `try_` calls as the primary surface, plus blocking counterparts that spin
//! with a wait strategy.
//!
//! Both handles shadow the *remote* cursor privately and refresh it from the
//! atomic only when the cached value says full (writer) or empty (reader),
//! so a steady-state transfer costs one release store and no acquire loads.

use crate::engine::ring_buffer::RingBuffer;
use crate::engine::sequence::{CachedSequence, Sequence};
use crate::engine::wait_strategy::{WaitStrategy, YieldingWaitStrategy};
use crate::engine::{is_power_of_two, BuildError, Result};
use std::sync::Arc;

/// State shared by the two handles
struct Shared<T> {
    buffer: RingBuffer<T>,
    capacity: i64,
    /// Highest sequence written; stored only by the writer
    write_cursor: Sequence,
    /// Highest sequence consumed; stored only by the reader
    read_cursor: Sequence,
}

/// Create a ring with the default cooperative-yield wait strategy
///
/// # Arguments
/// * `capacity` - Ring size; must be a positive power of two
///
/// # Errors
/// Returns [`BuildError::InvalidCapacity`] for a capacity that is zero,
/// negative, or not a power of two.
pub fn ring<T>(capacity: i64) -> Result<(SpscWriter<T>, SpscReader<T>)>
where
    T: Default + Send + Sync,
{
    ring_with(capacity, YieldingWaitStrategy::new())
}

/// Create a ring with a custom wait strategy for the blocking calls
pub fn ring_with<T, W>(capacity: i64, wait_strategy: W) -> Result<(SpscWriter<T>, SpscReader<T>)>
where
    T: Default + Send + Sync,
    W: WaitStrategy + 'static,
{
    if !is_power_of_two(capacity) {
        return Err(BuildError::InvalidCapacity { capacity });
    }
    let shared = Arc::new(Shared {
        buffer: RingBuffer::new(capacity as usize, T::default),
        capacity,
        write_cursor: Sequence::default(),
        read_cursor: Sequence::default(),
    });
    let wait_strategy: Arc<dyn WaitStrategy> = Arc::new(wait_strategy);
    Ok((
        SpscWriter {
            shared: Arc::clone(&shared),
            shadow: CachedSequence::default(),
            cached_read: CachedSequence::default(),
            wait_strategy: Arc::clone(&wait_strategy),
        },
        SpscReader {
            shared,
            shadow: CachedSequence::default(),
            cached_write: CachedSequence::default(),
            wait_strategy,
        },
    ))
}

/// The producing handle of an SPSC ring
pub struct SpscWriter<T> {
    shared: Arc<Shared<T>>,
    shadow: CachedSequence,
    cached_read: CachedSequence,
    wait_strategy: Arc<dyn WaitStrategy>,
}

impl<T> SpscWriter<T> {
    /// True when sequence `next` fits without overrunning the reader,
    /// refreshing the cached reader cursor at most once
    #[inline]
    fn has_room(&mut self, next: i64) -> bool {
        if next <= self.cached_read.get() + self.shared.capacity {
            return true;
        }
        self.cached_read.set(self.shared.read_cursor.get());
        next <= self.cached_read.get() + self.shared.capacity
    }

    /// Store and publish sequence `next`
    #[inline]
    fn commit(&mut self, next: i64, item: T) {
        // SAFETY: has_room showed the reader is past next - capacity, and
        // only this handle writes slots.
        unsafe { *self.shared.buffer.slot(next) = item };
        self.shared.write_cursor.set(next);
        self.shadow.set(next);
    }

    /// Publish one item without blocking
    ///
    /// # Returns
    /// `false` if the buffer is full. The item is discarded on failure;
    /// clone it first if it must survive a full buffer.
    pub fn try_write(&mut self, item: T) -> bool {
        let next = self.shadow.get() + 1;
        if !self.has_room(next) {
            return false;
        }
        self.commit(next, item);
        true
    }

    /// Publish one item, spinning while the buffer is full
    pub fn write(&mut self, item: T) {
        let next = self.shadow.get() + 1;
        let mut spins = 0u64;
        while !self.has_room(next) {
            self.wait_strategy.wait(spins);
            spins += 1;
        }
        self.commit(next, item);
    }

    /// The buffer capacity
    pub fn capacity(&self) -> i64 {
        self.shared.capacity
    }
}

impl<T> std::fmt::Debug for SpscWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpscWriter")
            .field("capacity", &self.shared.capacity)
            .field("sequence", &self.shadow.get())
            .finish()
    }
}

/// The consuming handle of an SPSC ring
pub struct SpscReader<T> {
    shared: Arc<Shared<T>>,
    shadow: CachedSequence,
    cached_write: CachedSequence,
    wait_strategy: Arc<dyn WaitStrategy>,
}

impl<T> SpscReader<T>
where
    T: Clone,
{
    /// True when sequence `next` has been published, refreshing the cached
    /// writer cursor at most once
    #[inline]
    fn has_item(&mut self, next: i64) -> bool {
        if next <= self.cached_write.get() {
            return true;
        }
        self.cached_write.set(self.shared.write_cursor.get());
        next <= self.cached_write.get()
    }

    /// Take sequence `next` out of the buffer and release its slot
    #[inline]
    fn take(&mut self, next: i64) -> T {
        // SAFETY: has_item observed the writer's release store covering
        // next, and the slot cannot be overwritten until read_cursor passes
        // it below.
        let item = unsafe { (*self.shared.buffer.slot(next)).clone() };
        self.shared.read_cursor.set(next);
        self.shadow.set(next);
        item
    }

    /// Consume the next item without blocking
    ///
    /// # Returns
    /// `None` if nothing has been published past this reader's position.
    pub fn try_consume(&mut self) -> Option<T> {
        let next = self.shadow.get() + 1;
        if !self.has_item(next) {
            return None;
        }
        Some(self.take(next))
    }

    /// Consume the next item, spinning while the buffer is empty
    pub fn read(&mut self) -> T {
        let next = self.shadow.get() + 1;
        let mut spins = 0u64;
        while !self.has_item(next) {
            self.wait_strategy.wait(spins);
            spins += 1;
        }
        self.take(next)
    }
}

impl<T> std::fmt::Debug for SpscReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpscReader")
            .field("capacity", &self.shared.capacity)
            .field("sequence", &self.shadow.get())
            .finish()
    }
}
