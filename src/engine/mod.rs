//! Ringline engine implementation
//!
//! This module provides the core of the ringline messaging engine: a bounded,
//! pre-allocated ring buffer with a single writer and consumer groups arranged
//! as a linear pipeline, coordinated through padded atomic sequence counters.

pub mod barrier;
pub mod builder;
pub mod closer;
pub mod consumer;
pub mod ring_buffer;
pub mod sequence;
pub mod spsc;
pub mod wait_strategy;
pub mod writer;


pub use barrier::{ClosedBarrier, SequenceBarrier};
pub use builder::{Consumers, Engine, EngineBuilder};
pub use closer::Closer;
pub use consumer::Consumer;
pub use ring_buffer::{split_range, RingBuffer};
pub use sequence::{CachedSequence, Sequence};
pub use wait_strategy::{
    BusySpinWaitStrategy, SleepingWaitStrategy, SpinYieldWaitStrategy, WaitStrategy,
    YieldingWaitStrategy,
};
pub use writer::Writer;

/// The starting value of every cursor.
///
/// Sequence 0 means "nothing published/consumed yet"; the first published
/// item carries sequence 1.
pub const INITIAL_SEQUENCE: i64 = 0;

/// Errors reported while assembling an engine
///
/// All of these are construction-time configuration problems and are
/// recoverable at startup. Runtime invariant violations (writing after
/// close, oversized batches) are programmer errors and panic instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("ring capacity must be a positive power of two, got {capacity}")]
    InvalidCapacity { capacity: i64 },

    #[error("engine requires at least one consumer group")]
    NoConsumerGroups,

    #[error("consumer group {group} is empty")]
    EmptyConsumerGroup { group: usize },
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// Utility function to check that a capacity is a positive power of 2
pub fn is_power_of_two(n: i64) -> bool {
    n > 0 && (n & (n - 1)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_power_of_two() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(2));
        assert!(is_power_of_two(4));
        assert!(is_power_of_two(4096));

        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(-8));
        assert!(!is_power_of_two(3));
        assert!(!is_power_of_two(7));
        assert!(!is_power_of_two(4095));
    }

    #[test]
    fn test_build_error_display() {
        let err = BuildError::InvalidCapacity { capacity: 7 };
        assert!(err.to_string().contains('7'));

        let err = BuildError::EmptyConsumerGroup { group: 1 };
        assert!(err.to_string().contains("group 1"));
    }
}
