//! Consumer workers and the drain loop
//!
//! Each consumer owns one cursor and one close flag and runs a long-lived
//! loop: process every sequence between its own cursor and its upstream
//! barrier, publish the cursor, repeat. When the upstream closed-barrier
//! reports that everything above has ceased publishing, the worker drains
//! whatever remains and exits, closing its own flag so the next tier can do
//! the same.

use crate::engine::barrier::{ClosedBarrier, SequenceBarrier};
use crate::engine::closer::Closer;
use crate::engine::ring_buffer::{split_range, RingBuffer};
use crate::engine::sequence::Sequence;
use crate::engine::wait_strategy::WaitStrategy;
use std::sync::Arc;

/// How a consumer wants items delivered
///
/// Chosen once at construction; the hot loop dispatches on it with a single
/// match, never per item.
pub(crate) enum ConsumerKind<T> {
    /// One callback invocation per item, in sequence order
    Single(Box<dyn FnMut(&T) + Send>),
    /// One callback invocation per processed range, as two contiguous runs
    /// (the second empty unless the range wraps)
    Batch(Box<dyn FnMut(&[T], &[T]) + Send>),
}

/// One consumer slot in a pipeline group
///
/// Wraps the user callback together with its delivery shape; handed to
/// [`EngineBuilder::consumer_group`](crate::engine::builder::EngineBuilder::consumer_group).
pub struct Consumer<T> {
    pub(crate) kind: ConsumerKind<T>,
}

impl<T> Consumer<T> {
    /// A consumer invoked once per item
    ///
    /// # Examples
    /// ```rust,ignore
    /// let group = vec![Consumer::single(|item: &u64| println!("{item}"))];
    /// ```
    pub fn single<F>(f: F) -> Self
    where
        F: FnMut(&T) + Send + 'static,
    {
        Self {
            kind: ConsumerKind::Single(Box::new(f)),
        }
    }

    /// A consumer invoked once per available range
    ///
    /// The callback receives two runs of the buffer covering the range in
    /// publication order. Prefer this over [`single`](Consumer::single) only
    /// when per-range processing genuinely pays, e.g. SIMD over large runs.
    pub fn batch<F>(f: F) -> Self
    where
        F: FnMut(&[T], &[T]) + Send + 'static,
    {
        Self {
            kind: ConsumerKind::Batch(Box::new(f)),
        }
    }
}

impl<T> std::fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            ConsumerKind::Single(_) => "single",
            ConsumerKind::Batch(_) => "batch",
        };
        f.debug_struct("Consumer").field("kind", &kind).finish()
    }
}

/// Sets a close flag when dropped
///
/// The worker's own flag must be set on every exit path, including an unwind
/// out of a panicking user callback; otherwise downstream tiers would spin
/// forever waiting for a closure that never comes.
struct CloseOnExit {
    closer: Arc<Closer>,
}

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        self.closer.close();
    }
}

/// A consumer bound to its barriers, cursor, and buffer
pub(crate) struct ConsumerWorker<T> {
    pub(crate) name: String,
    buffer: Arc<RingBuffer<T>>,
    upstream: SequenceBarrier,
    upstream_closed: ClosedBarrier,
    cursor: Arc<Sequence>,
    closer: Arc<Closer>,
    wait_strategy: Arc<dyn WaitStrategy>,
    kind: ConsumerKind<T>,
}

impl<T> ConsumerWorker<T> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        buffer: Arc<RingBuffer<T>>,
        upstream: SequenceBarrier,
        upstream_closed: ClosedBarrier,
        cursor: Arc<Sequence>,
        closer: Arc<Closer>,
        wait_strategy: Arc<dyn WaitStrategy>,
        kind: ConsumerKind<T>,
    ) -> Self {
        Self {
            name,
            buffer,
            upstream,
            upstream_closed,
            cursor,
            closer,
            wait_strategy,
            kind,
        }
    }

    /// Run the drain loop until the upstream is closed and fully consumed
    ///
    /// Exits only when "no items left" and "upstream closed" hold in the
    /// same iteration. Observing the closed flag (acquire) after a publish
    /// (release, program-ordered before the close) guarantees the next
    /// barrier load sees the final cursor value, so one re-check after the
    /// closed observation is enough to drain any publish racing the close.
    pub(crate) fn run(mut self) {
        let _close_on_exit = CloseOnExit {
            closer: Arc::clone(&self.closer),
        };
        tracing::trace!(consumer = %self.name, "consumer started");

        let mut current = self.cursor.get();
        let mut spins = 0u64;
        loop {
            let upstream = self.upstream.load();
            if current < upstream {
                self.dispatch(current, upstream);
                self.cursor.set(upstream);
                current = upstream;
                spins = 0;
                continue;
            }
            if self.upstream_closed.is_closed() {
                let upstream = self.upstream.load();
                if current < upstream {
                    self.dispatch(current, upstream);
                    self.cursor.set(upstream);
                    current = upstream;
                    continue;
                }
                tracing::trace!(consumer = %self.name, sequence = current, "consumer drained");
                return;
            }
            self.wait_strategy.wait(spins);
            spins += 1;
        }
    }

    /// Deliver every sequence in `(current, upstream]`
    #[inline]
    fn dispatch(&mut self, current: i64, upstream: i64) {
        let buffer = &self.buffer;
        match &mut self.kind {
            ConsumerKind::Single(f) => {
                for seq in current + 1..=upstream {
                    // SAFETY: seq is at or below the upstream barrier, so the
                    // writer committed it and cannot reclaim it until this
                    // worker's cursor passes it.
                    f(unsafe { &*buffer.slot(seq) });
                }
            }
            ConsumerKind::Batch(f) => {
                let mask = buffer.index_mask();
                let first = (current + 1) & mask;
                let last = upstream & mask;
                let (len1, len2) = split_range(buffer.capacity(), first, last);
                // SAFETY: as above for the whole committed range; split_range
                // keeps both runs in bounds.
                unsafe { f(buffer.slice(first as usize, len1), buffer.slice(0, len2)) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::wait_strategy::YieldingWaitStrategy;
    use std::sync::Mutex;

    fn worker_with_upstream(
        capacity: usize,
        kind: ConsumerKind<i64>,
    ) -> (ConsumerWorker<i64>, Arc<RingBuffer<i64>>, Arc<Sequence>, Arc<Closer>) {
        let buffer = Arc::new(RingBuffer::new(capacity, || 0i64));
        let upstream_cursor = Arc::new(Sequence::default());
        let upstream_closer = Arc::new(Closer::new());
        let worker = ConsumerWorker::new(
            "consumer-0-0".to_string(),
            Arc::clone(&buffer),
            SequenceBarrier::over(vec![Arc::clone(&upstream_cursor)]),
            ClosedBarrier::over(vec![Arc::clone(&upstream_closer)]),
            Arc::new(Sequence::default()),
            Arc::new(Closer::new()),
            Arc::new(YieldingWaitStrategy::new()),
            kind,
        );
        (worker, buffer, upstream_cursor, upstream_closer)
    }

    #[test]
    fn test_single_worker_drains_and_closes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let (worker, buffer, upstream_cursor, upstream_closer) = worker_with_upstream(
            4,
            ConsumerKind::Single(Box::new(move |item: &i64| {
                sink.lock().unwrap().push(*item);
            })),
        );
        let cursor = Arc::clone(&worker.cursor);
        let closer = Arc::clone(&worker.closer);

        // Publish 1..=3, then close; the worker must see all of it and exit.
        unsafe {
            *buffer.slot(1) = 10;
            *buffer.slot(2) = 20;
            *buffer.slot(3) = 30;
        }
        upstream_cursor.set(3);
        upstream_closer.close();

        worker.run();
        assert_eq!(*seen.lock().unwrap(), vec![10, 20, 30]);
        assert_eq!(cursor.get(), 3);
        assert!(closer.is_closed());
    }

    #[test]
    fn test_batch_worker_sees_wrapped_run() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let (worker, buffer, upstream_cursor, upstream_closer) = worker_with_upstream(
            4,
            ConsumerKind::Batch(Box::new(move |head: &[i64], tail: &[i64]| {
                let mut seen = sink.lock().unwrap();
                seen.extend_from_slice(head);
                seen.extend_from_slice(tail);
            })),
        );

        // Pretend sequences 1..=5 are already consumed up to 2 and published
        // to 5: the pending range 3..=5 wraps (indexes 3, 0, 1).
        unsafe {
            *buffer.slot(3) = 3;
            *buffer.slot(4) = 4;
            *buffer.slot(5) = 5;
        }
        worker.cursor.set(2);
        upstream_cursor.set(5);
        upstream_closer.close();

        worker.run();
        assert_eq!(*seen.lock().unwrap(), vec![3, 4, 5]);
    }

    #[test]
    fn test_worker_closes_even_when_callback_panics() {
        let (worker, buffer, upstream_cursor, upstream_closer) = worker_with_upstream(
            4,
            ConsumerKind::Single(Box::new(|_item: &i64| panic!("callback failure"))),
        );
        let closer = Arc::clone(&worker.closer);

        unsafe { *buffer.slot(1) = 1 };
        upstream_cursor.set(1);
        upstream_closer.close();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| worker.run()));
        assert!(result.is_err());
        assert!(closer.is_closed());
    }
}
