//! Rolling count/min/max/total aggregation.
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use tracing::trace;

use crate::atomics::{non_negative, AtomicF64, AtomicU64};
use crate::shard::{Shard, ShardedCell};

/// The count, minimum, maximum, and total of a set of samples, read together.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AggregateSnapshot {
    count: u64,
    min: f64,
    max: f64,
    total: f64,
}

impl AggregateSnapshot {
    /// Creates an `AggregateSnapshot` from its parts.
    pub fn new(count: u64, min: f64, max: f64, total: f64) -> AggregateSnapshot {
        AggregateSnapshot { count, min, max, total }
    }

    /// Gets the number of samples.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Gets the smallest sample, or zero if there were none.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Gets the largest sample, or zero if there were none.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Gets the sum of all samples.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Gets the mean of all samples, or zero if there were none.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Tracks the count, minimum, maximum, and total of non-negative samples over a window.
///
/// Any number of threads can record concurrently, and never block.  The four statistics are
/// always read together through [`snapshot`](RollingAggregator::snapshot), which never returns a
/// sample partially applied, nor a mix of the windows before and after a
/// [`reset`](RollingAggregator::reset) or [`rollover`](RollingAggregator::rollover).
///
/// Until a sample is recorded, the minimum and maximum read as zero.
#[derive(Debug)]
pub struct RollingAggregator {
    cell: ShardedCell<Aggregate>,
    previous: Mutex<AggregateSnapshot>,
}

impl RollingAggregator {
    /// Creates an empty `RollingAggregator`.
    pub fn new() -> RollingAggregator {
        RollingAggregator {
            cell: ShardedCell::new(Aggregate::new(), Aggregate::new()),
            previous: Mutex::new(AggregateSnapshot::default()),
        }
    }

    /// Records a sample into the current window.
    ///
    /// Negative and NaN samples are ignored entirely.
    pub fn record_non_negative(&self, sample: f64) {
        let Some(sample) = non_negative(sample) else {
            return;
        };

        self.cell.write(|aggregate| {
            aggregate.count.fetch_add(1, Ordering::Relaxed);
            aggregate.total.add(sample);
            aggregate.max.max(sample);
            aggregate.min.min(sample);
        });
    }

    /// Reads the current window.
    pub fn snapshot(&self) -> AggregateSnapshot {
        self.cell.read()
    }

    /// Gets the number of samples in the current window.
    pub fn count(&self) -> u64 {
        self.snapshot().count()
    }

    /// Gets the smallest sample in the current window, or zero if there were none.
    pub fn min(&self) -> f64 {
        self.snapshot().min()
    }

    /// Gets the largest sample in the current window, or zero if there were none.
    pub fn max(&self) -> f64 {
        self.snapshot().max()
    }

    /// Gets the sum of the samples in the current window.
    pub fn total(&self) -> f64 {
        self.snapshot().total()
    }

    /// Discards the current window and starts over from zero.
    pub fn reset(&self) {
        let _ = self.cell.reset();
    }

    /// Closes the current window and starts a new, empty one.
    ///
    /// The closed window stays readable through [`previous`](RollingAggregator::previous) until
    /// the next rollover, and is returned as well.
    pub fn rollover(&self) -> AggregateSnapshot {
        let mut previous = self.previous.lock();
        let closed = self.cell.reset();
        trace!(count = closed.count(), total = closed.total(), "rolled over aggregate window");
        *previous = closed;
        closed
    }

    /// Gets the last window closed by [`rollover`](RollingAggregator::rollover).
    ///
    /// Before the first rollover, this is an empty window.
    pub fn previous(&self) -> AggregateSnapshot {
        *self.previous.lock()
    }
}

impl Default for RollingAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct Aggregate {
    count: AtomicU64,
    total: AtomicF64,
    max: AtomicF64,
    min: AtomicF64,
}

impl Aggregate {
    fn new() -> Aggregate {
        Aggregate {
            count: AtomicU64::new(0),
            total: AtomicF64::new(0.0),
            max: AtomicF64::new(0.0),
            min: AtomicF64::new(f64::INFINITY),
        }
    }
}

impl Shard for Aggregate {
    type Snapshot = AggregateSnapshot;

    fn read(&self) -> AggregateSnapshot {
        let count = self.count.load(Ordering::Acquire);
        if count == 0 {
            return AggregateSnapshot::default();
        }

        AggregateSnapshot {
            count,
            min: self.min.load(Ordering::Acquire),
            max: self.max.load(Ordering::Acquire),
            total: self.total.load(Ordering::Acquire),
        }
    }

    fn merge_into(&self, other: &Self) {
        let count = self.count.load(Ordering::Acquire);
        if count == 0 {
            return;
        }

        other.count.fetch_add(count, Ordering::AcqRel);
        other.total.add(self.total.load(Ordering::Acquire));
        other.max.max(self.max.load(Ordering::Acquire));
        other.min.min(self.min.load(Ordering::Acquire));
    }

    fn clear(&self) {
        self.count.store(0, Ordering::Release);
        self.total.store(0.0, Ordering::Release);
        self.max.store(0.0, Ordering::Release);
        self.min.store(f64::INFINITY, Ordering::Release);
    }
}
