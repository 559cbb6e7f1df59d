//! Engine assembly: topology validation and wiring
//!
//! Consumer groups are declared in pipeline order. The first group reads the
//! writer's cursor; every later group reads the minimum over the previous
//! group's cursors, and closed-barriers are wired the same way over close
//! flags. The writer gates on the last group only: by construction every
//! earlier tier is at least as far along, so the tail minimum is the global
//! minimum.

use crate::engine::barrier::{ClosedBarrier, SequenceBarrier};
use crate::engine::closer::Closer;
use crate::engine::consumer::{Consumer, ConsumerWorker};
use crate::engine::ring_buffer::RingBuffer;
use crate::engine::sequence::Sequence;
use crate::engine::wait_strategy::{SleepingWaitStrategy, SpinYieldWaitStrategy, WaitStrategy};
use crate::engine::writer::Writer;
use crate::engine::{is_power_of_two, BuildError, Result};
use std::sync::Arc;
use std::thread;

/// Fluent configuration for an engine
///
/// # Examples
/// ```rust,ignore
/// let engine = EngineBuilder::new(1024, u64::default)
///     .consumer_group(vec![Consumer::single(|item: &u64| { /* tier 1 */ })])
///     .consumer_group(vec![Consumer::single(|item: &u64| { /* tier 2 */ })])
///     .build()?;
/// let (mut writer, consumers) = engine.into_parts();
/// ```
pub struct EngineBuilder<T, F>
where
    F: FnMut() -> T,
{
    capacity: i64,
    slot_factory: F,
    groups: Vec<Vec<Consumer<T>>>,
    writer_wait: Arc<dyn WaitStrategy>,
    reader_wait: Arc<dyn WaitStrategy>,
    consumer_cores: Vec<usize>,
}

impl<T, F> EngineBuilder<T, F>
where
    T: Send + Sync + 'static,
    F: FnMut() -> T,
{
    /// Start configuring an engine
    ///
    /// # Arguments
    /// * `capacity` - Ring size; must be a positive power of two
    /// * `slot_factory` - Called once per slot to pre-fill the buffer
    pub fn new(capacity: i64, slot_factory: F) -> Self {
        Self {
            capacity,
            slot_factory,
            groups: Vec::new(),
            writer_wait: Arc::new(SpinYieldWaitStrategy::new()),
            reader_wait: Arc::new(SleepingWaitStrategy::new()),
            consumer_cores: Vec::new(),
        }
    }

    /// Append a consumer group to the pipeline
    ///
    /// The first declared group consumes directly behind the writer; each
    /// subsequent group consumes behind the one declared before it.
    pub fn consumer_group(mut self, group: Vec<Consumer<T>>) -> Self {
        self.groups.push(group);
        self
    }

    /// Override how the writer waits when the buffer is full
    pub fn writer_wait<W>(mut self, strategy: W) -> Self
    where
        W: WaitStrategy + 'static,
    {
        self.writer_wait = Arc::new(strategy);
        self
    }

    /// Override how consumers wait when caught up with their upstream
    pub fn reader_wait<W>(mut self, strategy: W) -> Self
    where
        W: WaitStrategy + 'static,
    {
        self.reader_wait = Arc::new(strategy);
        self
    }

    /// Pin consumer threads to CPU cores, in declaration order
    ///
    /// Consumers beyond the end of `cores` run unpinned; extra entries are
    /// ignored.
    pub fn consumer_affinity(mut self, cores: Vec<usize>) -> Self {
        self.consumer_cores = cores;
        self
    }

    /// Validate the topology and wire the engine
    ///
    /// # Errors
    /// * [`BuildError::InvalidCapacity`] - capacity is not a positive power
    ///   of two
    /// * [`BuildError::NoConsumerGroups`] - a pipeline with no sinks is not
    ///   meaningful
    /// * [`BuildError::EmptyConsumerGroup`] - a declared group has no
    ///   consumers
    pub fn build(mut self) -> Result<Engine<T>> {
        if !is_power_of_two(self.capacity) {
            return Err(BuildError::InvalidCapacity {
                capacity: self.capacity,
            });
        }
        if self.groups.is_empty() {
            return Err(BuildError::NoConsumerGroups);
        }
        if let Some(group) = self.groups.iter().position(Vec::is_empty) {
            return Err(BuildError::EmptyConsumerGroup { group });
        }

        let buffer = Arc::new(RingBuffer::new(
            self.capacity as usize,
            &mut self.slot_factory,
        ));
        let write_cursor = Arc::new(Sequence::default());
        let write_closer = Arc::new(Closer::new());

        let mut upstream = SequenceBarrier::Single(Arc::clone(&write_cursor));
        let mut upstream_closed = ClosedBarrier::Single(Arc::clone(&write_closer));
        let mut workers = Vec::new();
        let mut cores = Vec::new();
        let group_count = self.groups.len();

        for (group_index, group) in self.groups.into_iter().enumerate() {
            let mut cursors = Vec::with_capacity(group.len());
            let mut closers = Vec::with_capacity(group.len());
            for (index, consumer) in group.into_iter().enumerate() {
                let cursor = Arc::new(Sequence::default());
                let closer = Arc::new(Closer::new());
                cores.push(self.consumer_cores.get(workers.len()).copied());
                workers.push(ConsumerWorker::new(
                    format!("consumer-{group_index}-{index}"),
                    Arc::clone(&buffer),
                    upstream.clone(),
                    upstream_closed.clone(),
                    Arc::clone(&cursor),
                    Arc::clone(&closer),
                    Arc::clone(&self.reader_wait),
                    consumer.kind,
                ));
                cursors.push(cursor);
                closers.push(closer);
            }
            upstream = SequenceBarrier::over(cursors);
            upstream_closed = ClosedBarrier::over(closers);
        }

        tracing::debug!(
            capacity = self.capacity,
            groups = group_count,
            consumers = workers.len(),
            "engine constructed"
        );

        // The loop leaves `upstream` pointing at the tail group, which is
        // exactly what gates the writer.
        let writer = Writer::new(
            buffer,
            write_cursor,
            write_closer,
            upstream,
            self.writer_wait,
        );
        Ok(Engine {
            writer,
            consumers: Consumers { workers, cores },
        })
    }
}

/// A fully wired engine: one writer plus its consumer pipeline
///
/// The two halves run on different threads, so the engine splits into a
/// [`Writer`] (the caller keeps it and publishes) and [`Consumers`] (driven
/// to completion by [`Consumers::loop_read`], usually on a dedicated thread).
#[derive(Debug)]
pub struct Engine<T> {
    writer: Writer<T>,
    consumers: Consumers<T>,
}

impl<T> Engine<T> {
    /// Split into the writer handle and the consumer pool
    pub fn into_parts(self) -> (Writer<T>, Consumers<T>) {
        (self.writer, self.consumers)
    }

    /// The buffer capacity
    pub fn capacity(&self) -> i64 {
        self.writer.capacity()
    }
}

/// The consumer side of an engine
pub struct Consumers<T> {
    workers: Vec<ConsumerWorker<T>>,
    cores: Vec<Option<usize>>,
}

impl<T> Consumers<T>
where
    T: Send + Sync + 'static,
{
    /// Number of consumers across all groups
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// True when the pipeline has no consumers; never the case for an engine
    /// that passed validation
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Drive every consumer to completion
    ///
    /// Starts one named OS thread per consumer (pinned if an affinity list
    /// was configured) and returns once all of them have drained their
    /// upstream and exited. If a consumer callback panicked, the panic is
    /// re-raised here after every other worker has been joined.
    pub fn loop_read(self) {
        let mut handles = Vec::with_capacity(self.workers.len());
        for (worker, core) in self.workers.into_iter().zip(self.cores) {
            let name = worker.name.clone();
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    if let Some(id) = core {
                        if !core_affinity::set_for_current(core_affinity::CoreId { id }) {
                            tracing::warn!(consumer = %name, core = id, "failed to pin consumer thread");
                        }
                    }
                    worker.run();
                })
                .expect("failed to spawn consumer thread");
            handles.push(handle);
        }

        let mut first_panic = None;
        for handle in handles {
            let name = handle.thread().name().map(str::to_owned);
            if let Err(payload) = handle.join() {
                tracing::error!(consumer = name.as_deref().unwrap_or("?"), "consumer panicked");
                first_panic.get_or_insert(payload);
            }
        }
        if let Some(payload) = first_panic {
            std::panic::resume_unwind(payload);
        }
    }
}

impl<T> std::fmt::Debug for Consumers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumers")
            .field("workers", &self.workers.len())
            .finish()
    }
}
