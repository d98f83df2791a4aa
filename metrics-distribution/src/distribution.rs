//! Meter-facing composition of the histogram, aggregator, and decaying maximum.
use std::sync::Arc;
use std::time::Duration;

use metrics::HistogramFn;
use parking_lot::Mutex;
use quanta::Clock;
use tracing::debug;

use crate::snapshot::estimate_percentiles;
use crate::{
    BoundarySet, ConfigurationError, CumulativeBucketHistogram, DistributionStatisticConfig,
    HistogramSnapshot, Quantile, RollingAggregator, TimeUnit, TimeWindowHistogram, TimeWindowMax,
};

/// Which samples a [`Distribution`] snapshot covers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Horizon {
    /// Every sample recorded since creation.
    ///
    /// The maximum and the percentile estimates are the exception: they decay over the
    /// configured expiry, so that they follow recent behavior.
    Cumulative,

    /// Only the samples recorded during the last completed step.
    ///
    /// Snapshots report the step frozen by the last [`rollover`](Distribution::rollover), and
    /// are empty until the first one.
    Step,
}

/// A distribution of values, such as request latencies or payload sizes.
///
/// Recording fans a sample out to a [`CumulativeBucketHistogram`], a [`RollingAggregator`], and,
/// for cumulative distributions, a [`TimeWindowMax`] and, when percentiles are published, a
/// [`TimeWindowHistogram`].  None of these ever block a recording thread.  Snapshots read all of them and assemble the result into a [`HistogramSnapshot`].
///
/// The histogram and the aggregator are each consistent on their own, but a snapshot reads them
/// one after the other: a sample recorded concurrently may be counted by the aggregator and not
/// yet by the histogram, or the reverse.
#[derive(Debug)]
pub struct Distribution {
    config: DistributionStatisticConfig,
    horizon: Horizon,
    base_unit: Option<TimeUnit>,
    histogram: CumulativeBucketHistogram,
    aggregator: RollingAggregator,
    max: TimeWindowMax,
    window: Option<TimeWindowHistogram>,
    published: Mutex<HistogramSnapshot>,
}

impl Distribution {
    /// Creates a `Distribution`.
    ///
    /// `config` is merged over [`DistributionStatisticConfig::default_config`] before resolving
    /// the bucket boundaries.  When `base_unit` is set, the distribution records durations and
    /// snapshots can be read in any [`TimeUnit`]: `config` is then merged over
    /// [`DistributionStatisticConfig::default_time_config`] instead, and percentile buckets are
    /// laid out for durations.
    ///
    /// # Errors
    ///
    /// Fails if the boundaries cannot be resolved from `config`, or if its expiry cannot be split
    /// over its buffer length.
    pub fn new(
        config: DistributionStatisticConfig,
        horizon: Horizon,
        base_unit: Option<TimeUnit>,
    ) -> Result<Distribution, ConfigurationError> {
        Distribution::with_clock(config, horizon, base_unit, Clock::new())
    }

    /// Creates a `Distribution` whose decaying maximum runs against `clock`.
    pub fn with_clock(
        config: DistributionStatisticConfig,
        horizon: Horizon,
        base_unit: Option<TimeUnit>,
        clock: Clock,
    ) -> Result<Distribution, ConfigurationError> {
        let defaults = match base_unit {
            Some(unit) => DistributionStatisticConfig::default_time_config(unit),
            None => DistributionStatisticConfig::default_config(),
        };
        let config = config.merge(&defaults);
        let bounds = Arc::new(BoundarySet::resolve_in(&config, base_unit)?);
        let max = TimeWindowMax::new(&config, clock.clone())?;
        let window = if horizon == Horizon::Cumulative && config.is_publishing_percentiles() {
            Some(TimeWindowHistogram::new(Arc::clone(&bounds), &config, clock)?)
        } else {
            None
        };

        debug!(
            ?horizon,
            buckets = bounds.len(),
            percentiles = config.percentiles().map_or(0, <[_]>::len),
            unit = base_unit.as_ref().map(TimeUnit::as_str),
            "created distribution"
        );

        let published = HistogramSnapshot::empty(bounds.iter()).with_base_unit(base_unit);
        Ok(Distribution {
            config,
            horizon,
            base_unit,
            histogram: CumulativeBucketHistogram::new(bounds),
            aggregator: RollingAggregator::new(),
            max,
            window,
            published: Mutex::new(published),
        })
    }

    /// Records a sample.
    ///
    /// Negative and NaN samples are ignored.
    pub fn record(&self, sample: f64) {
        if sample.is_nan() || sample < 0.0 {
            return;
        }

        self.histogram.record(sample);
        self.aggregator.record_non_negative(sample);
        if self.horizon == Horizon::Cumulative {
            self.max.record(sample);
        }
        if let Some(window) = &self.window {
            window.record(sample);
        }
    }

    /// Records a duration, expressed in the base unit.
    ///
    /// Distributions without a base unit record the duration in seconds.
    pub fn record_duration(&self, duration: Duration) {
        let unit = self.base_unit.unwrap_or(TimeUnit::Seconds);
        self.record(unit.from_duration(duration));
    }

    /// Takes a snapshot of the distribution.
    pub fn snapshot(&self) -> HistogramSnapshot {
        match self.horizon {
            Horizon::Cumulative => {
                let max = self.max.poll();
                let percentile_values = match &self.window {
                    Some(window) => estimate_percentiles(&window.counts(), self.percentiles(), max),
                    None => Vec::new(),
                };

                HistogramSnapshot::from_parts(
                    self.histogram.counts(),
                    self.aggregator.snapshot(),
                    &[],
                )
                .with_percentile_values(percentile_values)
                .with_max(max)
                .with_base_unit(self.base_unit)
            }
            Horizon::Step => self.published.lock().clone(),
        }
    }

    /// Closes the current step and publishes it.
    ///
    /// Meant to be called by the exporter's step scheduler once per step.  Does nothing for
    /// cumulative distributions.
    pub fn rollover(&self) {
        if self.horizon == Horizon::Cumulative {
            return;
        }

        let mut published = self.published.lock();
        let counts = self.histogram.reset();
        let aggregate = self.aggregator.rollover();
        *published = HistogramSnapshot::from_parts(counts, aggregate, self.percentiles())
            .with_base_unit(self.base_unit);
    }

    /// Gets the resolved configuration.
    pub fn config(&self) -> &DistributionStatisticConfig {
        &self.config
    }

    /// Gets the horizon.
    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    /// Gets the base unit, for time distributions.
    pub fn base_unit(&self) -> Option<TimeUnit> {
        self.base_unit
    }

    /// Gets the bucket boundaries.
    pub fn bounds(&self) -> &BoundarySet {
        self.histogram.bounds()
    }

    fn percentiles(&self) -> &[Quantile] {
        self.config.percentiles().unwrap_or_default()
    }
}

impl HistogramFn for Distribution {
    fn record(&self, value: f64) {
        Distribution::record(self, value);
    }
}
