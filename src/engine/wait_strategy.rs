//! Wait strategies for blocked roles
//!
//! The hot path never blocks: back-pressure (writer side) and emptiness
//! (reader side) are expressed as spinning, and a wait strategy decides what
//! each empty spin costs. The choice trades latency against CPU occupancy
//! and is exposed on the builder for both roles.

use std::hint;
use std::thread;
use std::time::Duration;

/// Strategy invoked while a spin loop comes up empty
///
/// Implementations must not hold any lock across the wait; the caller is on
/// the hot path and will retry immediately after.
pub trait WaitStrategy: Send + Sync + std::fmt::Debug {
    /// Called once per fruitless spin
    ///
    /// # Arguments
    /// * `spins` - How many times the current blocked operation has already
    ///   waited; resets to zero once progress is made
    fn wait(&self, spins: u64);
}

/// Spin, yielding the CPU once every `spin_mask + 1` spins
///
/// This is the default writer strategy: a full buffer usually drains within
/// a few spins, so the yield syscall is amortized over a large spin window
/// instead of being paid on every iteration.
#[derive(Debug)]
pub struct SpinYieldWaitStrategy {
    spin_mask: u64,
}

impl SpinYieldWaitStrategy {
    /// Create the strategy with the default window of 2^14 spins
    pub fn new() -> Self {
        Self {
            spin_mask: (1 << 14) - 1,
        }
    }

    /// Create the strategy with a custom window
    ///
    /// # Arguments
    /// * `spins_per_yield` - Spins between yields; must be a power of two
    ///
    /// # Panics
    /// Panics if `spins_per_yield` is not a positive power of two
    pub fn with_spins_per_yield(spins_per_yield: u64) -> Self {
        assert!(
            spins_per_yield.is_power_of_two(),
            "spins_per_yield must be a power of two"
        );
        Self {
            spin_mask: spins_per_yield - 1,
        }
    }
}

impl Default for SpinYieldWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SpinYieldWaitStrategy {
    fn wait(&self, spins: u64) {
        if spins & self.spin_mask == 0 {
            thread::yield_now();
        } else {
            hint::spin_loop();
        }
    }
}

/// Sleep for a fixed period on every spin
///
/// This is the default reader strategy for pipelined consumers: it keeps an
/// idle pipeline nearly free on the host at the price of the sleep period in
/// added wake-up latency.
#[derive(Debug)]
pub struct SleepingWaitStrategy {
    period: Duration,
}

impl SleepingWaitStrategy {
    /// Create the strategy with the default 50 microsecond period
    pub fn new() -> Self {
        Self {
            period: Duration::from_micros(50),
        }
    }

    /// Create the strategy with a custom sleep period
    pub fn with_period(period: Duration) -> Self {
        Self { period }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait(&self, _spins: u64) {
        thread::sleep(self.period);
    }
}

/// Yield the CPU on every spin
///
/// A good fit for tight single-producer/single-consumer loops where the
/// counterpart is expected on a neighboring core.
#[derive(Debug, Default)]
pub struct YieldingWaitStrategy;

impl YieldingWaitStrategy {
    /// Create a new yielding wait strategy
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait(&self, _spins: u64) {
        thread::yield_now();
    }
}

/// Busy-spin without yielding
///
/// Lowest latency, saturates a core while waiting. Use only when a core can
/// be dedicated to the role.
#[derive(Debug, Default)]
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    /// Create a new busy-spin wait strategy
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait(&self, _spins: u64) {
        hint::spin_loop();
    }
}
