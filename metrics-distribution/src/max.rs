//! Decaying maximum.
use std::sync::atomic::Ordering;
use std::time::Duration;

use quanta::Clock;

use crate::atomics::{non_negative, AtomicF64};
use crate::window::Rotation;
use crate::{ConfigurationError, DistributionStatisticConfig};

/// The maximum of the samples recorded over a trailing window of time.
///
/// Samples are recorded into a ring of `buffer_length` slots, each of which covers the whole
/// trailing window but started at a different time.  Every `expiry / buffer_length`, the oldest
/// slot is cleared and becomes the newest one, and the slot after it becomes the one that is read.
/// A sample therefore stays visible for somewhere between `expiry - expiry / buffer_length` and
/// `expiry`.
///
/// Rotation is driven lazily, by recording or polling, against a [`quanta::Clock`] so that tests
/// can control time with a mocked clock.
#[derive(Debug)]
pub struct TimeWindowMax {
    rotation: Rotation,
    ring: Box<[AtomicF64]>,
}

impl TimeWindowMax {
    /// Creates a `TimeWindowMax` from the expiry and buffer length of `config`.
    ///
    /// Unset options are taken from the library-wide defaults.
    pub fn new(
        config: &DistributionStatisticConfig,
        clock: Clock,
    ) -> Result<TimeWindowMax, ConfigurationError> {
        Ok(TimeWindowMax::from_rotation(Rotation::from_config(config, clock)?))
    }

    /// Creates a `TimeWindowMax` over `buffer_length` slots, fully expiring samples after
    /// `expiry`.
    pub fn with_window(
        clock: Clock,
        expiry: Duration,
        buffer_length: u32,
    ) -> Result<TimeWindowMax, ConfigurationError> {
        Ok(TimeWindowMax::from_rotation(Rotation::new(clock, expiry, buffer_length)?))
    }

    fn from_rotation(rotation: Rotation) -> TimeWindowMax {
        let ring = (0..rotation.len()).map(|_| AtomicF64::new(0.0)).collect();
        TimeWindowMax { rotation, ring }
    }

    /// Records a sample.
    ///
    /// Negative and NaN samples are ignored.
    pub fn record(&self, sample: f64) {
        let Some(sample) = non_negative(sample) else {
            return;
        };

        self.rotate();
        for slot in self.ring.iter() {
            slot.max(sample);
        }
    }

    /// Gets the maximum over the trailing window, or zero if nothing was recorded within it.
    pub fn poll(&self) -> f64 {
        self.rotate();
        self.ring[self.rotation.current()].load(Ordering::Acquire)
    }

    fn rotate(&self) {
        self.rotation.rotate(|slot| self.ring[slot].store(0.0, Ordering::Release));
    }
}
