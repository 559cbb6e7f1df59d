//! `Ringline` - Single-Writer Ring-Pipeline Engine
//!
//! An in-process, ultra-low-latency message-passing engine: a bounded,
//! pre-allocated ring buffer with a single writer and one or more consumer
//! groups arranged as a directed pipeline, in the tradition of the LMAX
//! Disruptor pattern.
//!
//! ## Features
//!
//! - **Lock-free**: the hot path is exactly one release store per publish
//!   and acquire loads on observation; no mutex is ever held
//! - **Zero steady-state allocation**: every slot is pre-allocated at
//!   construction and overwritten in place
//! - **Mechanical sympathy**: every independently-written cursor occupies
//!   its own cache line, and remote cursors are read through amortizing
//!   private shadows
//! - **Pipelined consumer groups**: consumers in a group race over the same
//!   items; groups run downstream-after-upstream behind minimum barriers
//! - **Graceful close**: shutdown drains tier by tier, so every consumer
//!   observes every item published before the close
//!
//! ## Quick Start
//!
//! ```rust
//! use ringline::{Consumer, EngineBuilder};
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let sum = Arc::new(AtomicU64::new(0));
//! let sink = Arc::clone(&sum);
//!
//! let engine = EngineBuilder::new(1024, u64::default)
//!     .consumer_group(vec![Consumer::single(move |item: &u64| {
//!         sink.fetch_add(*item, Ordering::Relaxed);
//!     })])
//!     .build()
//!     .expect("valid configuration");
//!
//! let (mut writer, consumers) = engine.into_parts();
//! let pipeline = thread::spawn(move || consumers.loop_read());
//!
//! for i in 1..=100 {
//!     writer.write(|slot| *slot = i);
//! }
//! writer.close();
//!
//! pipeline.join().unwrap();
//! assert_eq!(sum.load(Ordering::Relaxed), 5050);
//! ```
//!
//! ## Architecture
//!
//! - [`Sequence`]: padded atomic cursor; one per writer and per consumer
//! - [`SequenceBarrier`]: "highest safe sequence" view over upstream cursors
//! - [`ClosedBarrier`]: "everything upstream has ceased" view over close flags
//! - [`RingBuffer`]: pre-allocated power-of-two slot array
//! - [`Writer`]: reserve/commit publishing core, gated on the tail group
//! - [`Consumer`] / [`Consumers`]: per-item or batch workers, one thread each
//! - [`EngineBuilder`]: topology declaration and validation
//! - [`WaitStrategy`]: pluggable latency/CPU trade-off while blocked
//! - [`spsc`]: two-cursor single-producer/single-consumer degenerate ring
//!
//! ## Concurrency contract
//!
//! Exactly one writer thread; exactly one thread per consumer (started by
//! [`Consumers::loop_read`]). The acquire/release pair on cursor cells is the
//! only synchronization: a consumer that observes `write_cursor >= s` also
//! observes every slot write behind sequence `s`, and the same edge repeats
//! between pipeline tiers. Back-pressure and emptiness are spins through a
//! [`WaitStrategy`], never blocking calls.

pub mod engine;

// Re-export the public surface for convenience
pub use engine::{
    is_power_of_two,
    spsc,
    // Error types
    BuildError,
    // Wait strategies
    BusySpinWaitStrategy,
    // Barriers
    ClosedBarrier,
    // Consumers
    Consumer,
    Consumers,
    // Core types
    Engine,
    EngineBuilder,
    Result,
    RingBuffer,
    Sequence,
    SequenceBarrier,
    SleepingWaitStrategy,
    SpinYieldWaitStrategy,
    WaitStrategy,
    Writer,
    YieldingWaitStrategy,
    // Constants
    INITIAL_SEQUENCE,
};
