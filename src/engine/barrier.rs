//! Barriers for coordinating pipeline tiers
//!
//! A barrier is a read-only view of "the highest sequence that is safe to
//! consume from here". First-tier consumers see the writer's cursor directly;
//! later tiers see the minimum over the previous tier's cursors. Closed
//! barriers answer the analogous question for shutdown: has everything
//! upstream of this point ceased publishing?
//!
//! The pipeline is a chain, so two concrete shapes per barrier are enough;
//! groups of one collapse to the single-cursor form at wiring time and pay
//! no aggregation cost at all.

use crate::engine::closer::Closer;
use crate::engine::sequence::Sequence;
use std::sync::Arc;

/// A read-only view over one or more upstream cursors
#[derive(Debug, Clone)]
pub enum SequenceBarrier {
    /// Delegates directly to a single upstream cursor
    Single(Arc<Sequence>),
    /// The minimum over a group of upstream cursors
    Minimum(Box<[Arc<Sequence>]>),
}

impl SequenceBarrier {
    /// Build the barrier over a group of cursors, collapsing groups of one
    ///
    /// # Panics
    /// Panics if `cursors` is empty; the builder never wires an empty group.
    pub fn over(mut cursors: Vec<Arc<Sequence>>) -> Self {
        assert!(!cursors.is_empty(), "barrier over empty cursor group");
        if cursors.len() == 1 {
            SequenceBarrier::Single(cursors.pop().expect("len checked"))
        } else {
            SequenceBarrier::Minimum(cursors.into_boxed_slice())
        }
    }

    /// The highest sequence every cursor behind this barrier has reached
    ///
    /// The group minimum is reduced pairwise without branches: the sign bit
    /// of the difference, arithmetic-shifted into an all-ones mask, selects
    /// the smaller operand. A conditional here would mispredict under burst
    /// traffic because which cursor trails is data-dependent.
    #[inline]
    pub fn load(&self) -> i64 {
        match self {
            SequenceBarrier::Single(cursor) => cursor.get(),
            SequenceBarrier::Minimum(cursors) => {
                let mut minimum = cursors[0].get();
                for cursor in &cursors[1..] {
                    let seq = cursor.get();
                    let diff = minimum - seq;
                    minimum = seq + (diff & (diff >> 63));
                }
                minimum
            }
        }
    }
}

/// A read-only view over one or more upstream close flags
#[derive(Debug, Clone)]
pub enum ClosedBarrier {
    /// Delegates directly to a single upstream flag
    Single(Arc<Closer>),
    /// Closed only when every flag in the group is closed
    All(Box<[Arc<Closer>]>),
}

impl ClosedBarrier {
    /// Build the barrier over a group of close flags, collapsing groups of one
    ///
    /// # Panics
    /// Panics if `closers` is empty; the builder never wires an empty group.
    pub fn over(mut closers: Vec<Arc<Closer>>) -> Self {
        assert!(!closers.is_empty(), "barrier over empty closer group");
        if closers.len() == 1 {
            ClosedBarrier::Single(closers.pop().expect("len checked"))
        } else {
            ClosedBarrier::All(closers.into_boxed_slice())
        }
    }

    /// True once every upstream contributor has ceased publishing
    #[inline]
    pub fn is_closed(&self) -> bool {
        match self {
            ClosedBarrier::Single(closer) => closer.is_closed(),
            ClosedBarrier::All(closers) => closers.iter().all(|c| c.is_closed()),
        }
    }
}
