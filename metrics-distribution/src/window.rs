//! Ring-buffered statistics that decay over a trailing window of time.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use quanta::{Clock, Instant};
use tracing::trace;

use crate::atomics::{non_negative, AtomicU64};
use crate::{
    BoundarySet, ConfigurationError, CountAtBucket, CumulativeBucketHistogram,
    DistributionStatisticConfig,
};

/// Lazy rotation through the slots of a ring buffer.
///
/// Every `expiry / buffer_length`, the slot being read is retired and the next one takes its
/// place.  Rotation happens when a caller asks for it, against a [`quanta::Clock`], and only one
/// caller rotates at a time; everyone else keeps using the slot that was current.
#[derive(Debug)]
pub(crate) struct Rotation {
    clock: Clock,
    origin: Instant,
    period: u64,
    len: usize,
    current: AtomicUsize,
    last_rotation: AtomicU64,
    rotating: Mutex<()>,
}

impl Rotation {
    /// Creates a `Rotation` from the expiry and buffer length of `config`, taking unset options
    /// from the library-wide defaults.
    pub fn from_config(
        config: &DistributionStatisticConfig,
        clock: Clock,
    ) -> Result<Rotation, ConfigurationError> {
        let config = config.merge(&DistributionStatisticConfig::default_config());
        let expiry = config.expiry().unwrap_or(Duration::from_secs(120));
        let buffer_length = config.buffer_length().unwrap_or(3);
        Rotation::new(clock, expiry, buffer_length)
    }

    pub fn new(
        clock: Clock,
        expiry: Duration,
        buffer_length: u32,
    ) -> Result<Rotation, ConfigurationError> {
        if buffer_length == 0 {
            return Err(ConfigurationError::InvalidBufferLength(buffer_length));
        }

        let period = expiry.as_nanos() / u128::from(buffer_length);
        let period = u64::try_from(period).unwrap_or(u64::MAX);
        if period == 0 {
            return Err(ConfigurationError::InvalidRotationPeriod {
                expiry_ms: expiry.as_millis(),
                buffer_length,
            });
        }

        let origin = clock.now();
        Ok(Rotation {
            clock,
            origin,
            period,
            len: buffer_length as usize,
            current: AtomicUsize::new(0),
            last_rotation: AtomicU64::new(0),
            rotating: Mutex::new(()),
        })
    }

    /// Number of slots in the ring.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Index of the slot to read from.
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// Catches up with the clock, calling `clear` with the index of every retired slot.
    ///
    /// The new current slot is published before any slot is cleared, so readers never observe
    /// a cleared slot as the current one unless the whole ring expired.  Falling several periods
    /// behind clears at most the whole ring.
    pub fn rotate<F>(&self, mut clear: F)
    where
        F: FnMut(usize),
    {
        let now = self.elapsed();
        if now.saturating_sub(self.last_rotation.load(Ordering::Acquire)) < self.period {
            return;
        }

        // Someone else is already rotating, and will have caught up by the time they're done.
        let Some(_guard) = self.rotating.try_lock() else {
            return;
        };

        let last = self.last_rotation.load(Ordering::Acquire);
        let missed = now.saturating_sub(last) / self.period;
        if missed == 0 {
            return;
        }

        let steps = usize::try_from(missed).map_or(self.len, |m| m.min(self.len));
        let retired = self.current.load(Ordering::Acquire);
        let current = (retired + steps) % self.len;
        self.current.store(current, Ordering::Release);
        self.last_rotation.store(last + missed * self.period, Ordering::Release);

        for step in 0..steps {
            clear((retired + step) % self.len);
        }
        trace!(missed, current, "rotated time window");
    }

    fn elapsed(&self) -> u64 {
        let elapsed = self.clock.now().saturating_duration_since(self.origin).as_nanos();
        u64::try_from(elapsed).unwrap_or(u64::MAX)
    }
}

/// A bucket histogram of the samples recorded over a trailing window of time.
///
/// Samples are recorded into a ring of `buffer_length` histograms, each covering the whole
/// trailing window but started at a different time.  Every `expiry / buffer_length`, the oldest
/// one is cleared and the next one becomes the one that is read, so a sample stays visible for
/// somewhere between `expiry - expiry / buffer_length` and `expiry`.
///
/// This is what percentile estimates of cumulative distributions are computed from: the bucket
/// counts themselves keep the whole history, but percentiles follow recent behavior.
#[derive(Debug)]
pub struct TimeWindowHistogram {
    rotation: Rotation,
    ring: Box<[CumulativeBucketHistogram]>,
}

impl TimeWindowHistogram {
    /// Creates a `TimeWindowHistogram` over `bounds`, from the expiry and buffer length of
    /// `config`.
    ///
    /// Unset options are taken from the library-wide defaults.
    pub fn new(
        bounds: Arc<BoundarySet>,
        config: &DistributionStatisticConfig,
        clock: Clock,
    ) -> Result<TimeWindowHistogram, ConfigurationError> {
        Ok(TimeWindowHistogram::from_rotation(bounds, Rotation::from_config(config, clock)?))
    }

    /// Creates a `TimeWindowHistogram` over `buffer_length` histograms, fully expiring samples
    /// after `expiry`.
    pub fn with_window(
        bounds: Arc<BoundarySet>,
        clock: Clock,
        expiry: Duration,
        buffer_length: u32,
    ) -> Result<TimeWindowHistogram, ConfigurationError> {
        let rotation = Rotation::new(clock, expiry, buffer_length)?;
        Ok(TimeWindowHistogram::from_rotation(bounds, rotation))
    }

    fn from_rotation(bounds: Arc<BoundarySet>, rotation: Rotation) -> TimeWindowHistogram {
        let ring = (0..rotation.len())
            .map(|_| CumulativeBucketHistogram::new(Arc::clone(&bounds)))
            .collect();
        TimeWindowHistogram { rotation, ring }
    }

    /// Records a sample.
    ///
    /// Negative and NaN samples are ignored.
    pub fn record(&self, sample: f64) {
        let Some(sample) = non_negative(sample) else {
            return;
        };

        self.rotate();
        for histogram in self.ring.iter() {
            histogram.record(sample);
        }
    }

    /// Gets the count at each boundary, over the trailing window.
    pub fn counts(&self) -> Vec<CountAtBucket> {
        self.rotate();
        self.ring[self.rotation.current()].counts()
    }

    fn rotate(&self) {
        self.rotation.rotate(|slot| {
            let _ = self.ring[slot].reset();
        });
    }
}
