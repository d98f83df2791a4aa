//! Immutable point-in-time views of a distribution.
use std::fmt;

use crate::{
    AggregateSnapshot, CumulativeBucketHistogram, DistributionStatisticConfig, Quantile,
    RollingAggregator, TimeUnit,
};

/// The cumulative count of samples at or below a bucket boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CountAtBucket {
    bucket: f64,
    count: u64,
}

impl CountAtBucket {
    /// Creates a `CountAtBucket`.
    pub fn new(bucket: f64, count: u64) -> CountAtBucket {
        CountAtBucket { bucket, count }
    }

    /// Gets the bucket boundary.
    pub fn bucket(&self) -> f64 {
        self.bucket
    }

    /// Gets the number of samples less than or equal to the boundary.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Whether this is the final, unbounded bucket.
    pub fn is_infinite(&self) -> bool {
        self.bucket == f64::INFINITY
    }
}

/// An estimated value at a given percentile.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueAtPercentile {
    quantile: Quantile,
    value: f64,
}

impl ValueAtPercentile {
    /// Creates a `ValueAtPercentile`.
    pub fn new(quantile: Quantile, value: f64) -> ValueAtPercentile {
        ValueAtPercentile { quantile, value }
    }

    /// Gets the quantile, with its display label.
    pub fn quantile(&self) -> &Quantile {
        &self.quantile
    }

    /// Gets the percentile, expressed as a quantile: the 95th percentile is `0.95`.
    pub fn percentile(&self) -> f64 {
        self.quantile.value()
    }

    /// Gets the estimated value.
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// A point-in-time summary of a distribution.
///
/// Snapshots are plain values: they are produced once, never change afterwards, and are what
/// exporters consume.  They hold the total count, total amount, and maximum of the samples, the
/// cumulative count at each bucket boundary, and the estimated value at each configured
/// percentile.
///
/// All values are stored in a single base unit.  For time distributions, the `*_in` accessors
/// convert to another [`TimeUnit`] at read time.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramSnapshot {
    count: u64,
    total: f64,
    max: f64,
    histogram_counts: Vec<CountAtBucket>,
    percentile_values: Vec<ValueAtPercentile>,
    base_unit: Option<TimeUnit>,
}

impl HistogramSnapshot {
    /// Creates a `HistogramSnapshot` from its parts.
    pub fn new(
        count: u64,
        total: f64,
        max: f64,
        histogram_counts: Vec<CountAtBucket>,
        percentile_values: Vec<ValueAtPercentile>,
    ) -> HistogramSnapshot {
        HistogramSnapshot { count, total, max, histogram_counts, percentile_values, base_unit: None }
    }

    /// Creates an empty snapshot over the given boundaries.
    pub fn empty(bounds: impl IntoIterator<Item = f64>) -> HistogramSnapshot {
        let histogram_counts = bounds.into_iter().map(|b| CountAtBucket::new(b, 0)).collect();
        HistogramSnapshot::new(0, 0.0, 0.0, histogram_counts, Vec::new())
    }

    /// Assembles a snapshot from the current state of a histogram and an aggregator.
    ///
    /// Count, total, and maximum come from the aggregator, bucket counts from the histogram, and
    /// an estimated value is computed for each percentile of `config`.
    pub fn assemble(
        histogram: &CumulativeBucketHistogram,
        aggregator: &RollingAggregator,
        config: &DistributionStatisticConfig,
    ) -> HistogramSnapshot {
        let percentiles = config.percentiles().unwrap_or_default();
        HistogramSnapshot::from_parts(histogram.counts(), aggregator.snapshot(), percentiles)
    }

    /// Assembles a snapshot from already-read bucket counts and aggregate statistics.
    ///
    /// Percentiles are estimated with the nearest-rank method over the bucket counts: the value
    /// at percentile `p` is the smallest boundary whose cumulative count reaches `p * n`, where
    /// `n` is the count of the final bucket.  This is an upper bound of the true value, off by at
    /// most one bucket width.  When that boundary is the unbounded one, the maximum is reported
    /// instead, and an empty histogram estimates every percentile at zero.
    pub fn from_parts(
        histogram_counts: Vec<CountAtBucket>,
        aggregate: AggregateSnapshot,
        percentiles: &[Quantile],
    ) -> HistogramSnapshot {
        let percentile_values =
            estimate_percentiles(&histogram_counts, percentiles, aggregate.max());
        HistogramSnapshot::new(
            aggregate.count(),
            aggregate.total(),
            aggregate.max(),
            histogram_counts,
            percentile_values,
        )
    }

    pub(crate) fn with_base_unit(mut self, base_unit: Option<TimeUnit>) -> HistogramSnapshot {
        self.base_unit = base_unit;
        self
    }

    pub(crate) fn with_max(mut self, max: f64) -> HistogramSnapshot {
        self.max = max;
        self
    }

    pub(crate) fn with_percentile_values(
        mut self,
        percentile_values: Vec<ValueAtPercentile>,
    ) -> HistogramSnapshot {
        self.percentile_values = percentile_values;
        self
    }

    /// Gets the number of samples.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Gets the sum of all samples, in the base unit.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Gets the largest sample, in the base unit.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Gets the mean of all samples, in the base unit, or zero if there were none.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }

    /// Whether no samples were recorded.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Gets the cumulative count at each boundary, in ascending boundary order.
    ///
    /// The final entry is always the unbounded bucket.
    pub fn histogram_counts(&self) -> &[CountAtBucket] {
        &self.histogram_counts
    }

    /// Gets the estimated value at each configured percentile, in configuration order.
    pub fn percentile_values(&self) -> &[ValueAtPercentile] {
        &self.percentile_values
    }

    /// Gets the unit values are stored in, for time distributions.
    pub fn base_unit(&self) -> Option<TimeUnit> {
        self.base_unit
    }

    /// Gets the sum of all samples, in `unit`.
    ///
    /// Values of distributions that are not time-based are returned as-is.
    pub fn total_in(&self, unit: TimeUnit) -> f64 {
        self.scale(self.total, unit)
    }

    /// Gets the largest sample, in `unit`.
    pub fn max_in(&self, unit: TimeUnit) -> f64 {
        self.scale(self.max, unit)
    }

    /// Gets the mean of all samples, in `unit`.
    pub fn mean_in(&self, unit: TimeUnit) -> f64 {
        self.scale(self.mean(), unit)
    }

    /// Gets the bucket counts with their boundaries expressed in `unit`.
    pub fn histogram_counts_in(&self, unit: TimeUnit) -> Vec<CountAtBucket> {
        self.histogram_counts
            .iter()
            .map(|c| CountAtBucket::new(self.scale(c.bucket(), unit), c.count()))
            .collect()
    }

    /// Gets the percentile estimates expressed in `unit`.
    pub fn percentile_values_in(&self, unit: TimeUnit) -> Vec<ValueAtPercentile> {
        self.percentile_values
            .iter()
            .map(|v| ValueAtPercentile::new(v.quantile().clone(), self.scale(v.value(), unit)))
            .collect()
    }

    fn scale(&self, value: f64, unit: TimeUnit) -> f64 {
        match self.base_unit {
            Some(base) => base.convert(value, unit),
            None => value,
        }
    }
}

impl fmt::Display for HistogramSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>10}", "Bucket", "TotalCount")?;
        writeln!(f)?;
        for bucket in &self.histogram_counts {
            writeln!(f, "{:>14.1} {:>10}", bucket.bucket(), bucket.count())?;
        }
        writeln!(f)?;
        write!(f, "count={} total={} max={}", self.count, self.total, self.max)?;
        if let Some(unit) = self.base_unit {
            write!(f, " unit={}", unit)?;
        }
        for value in &self.percentile_values {
            write!(f, " {}={}", value.quantile().label(), value.value())?;
        }
        Ok(())
    }
}

/// Estimates each percentile from cumulative bucket counts, using the nearest-rank method.
///
/// `max` stands in for any estimate that lands in the unbounded bucket.
pub(crate) fn estimate_percentiles(
    counts: &[CountAtBucket],
    percentiles: &[Quantile],
    max: f64,
) -> Vec<ValueAtPercentile> {
    percentiles
        .iter()
        .map(|q| ValueAtPercentile::new(q.clone(), value_at_percentile(counts, q.value(), max)))
        .collect()
}

fn value_at_percentile(counts: &[CountAtBucket], percentile: f64, max: f64) -> f64 {
    let observed = counts.last().map_or(0, CountAtBucket::count);
    if observed == 0 {
        return 0.0;
    }

    let rank = (nearest_rank(percentile * observed as f64) as u64).clamp(1, observed);
    match counts.iter().find(|c| c.count() >= rank) {
        Some(bucket) if !bucket.is_infinite() => bucket.bucket(),
        _ => max,
    }
}

/// Rounds a fractional rank up, treating products within rounding error of an integer as that
/// integer: `0.55 * 100.0` is `55.00000000000001`, and has to rank 55, not 56.
fn nearest_rank(rank: f64) -> f64 {
    const EPSILON: f64 = 1e-9;

    let rounded = rank.round();
    if (rank - rounded).abs() < EPSILON * rounded.max(1.0) {
        rounded
    } else {
        rank.ceil()
    }
}

#[cfg(test)]
mod tests {
    use super::{CountAtBucket, HistogramSnapshot, ValueAtPercentile};
    use crate::{
        AggregateSnapshot, BoundarySet, CumulativeBucketHistogram, DistributionStatisticConfig,
        Quantile, RollingAggregator, TimeUnit,
    };
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn parts(bounds: &[f64], values: &[f64]) -> (Vec<CountAtBucket>, AggregateSnapshot) {
        let histogram = CumulativeBucketHistogram::new(Arc::new(BoundarySet::new(bounds)));
        let aggregator = RollingAggregator::new();
        for value in values {
            histogram.record(*value);
            aggregator.record_non_negative(*value);
        }
        (histogram.counts(), aggregator.snapshot())
    }

    fn estimates(snapshot: &HistogramSnapshot) -> Vec<f64> {
        snapshot.percentile_values().iter().map(ValueAtPercentile::value).collect()
    }

    #[test]
    fn test_assemble() {
        let config = DistributionStatisticConfig::builder()
            .percentiles(&[0.5, 0.9])
            .build()
            .expect("valid config");
        let histogram = CumulativeBucketHistogram::new(Arc::new(BoundarySet::new(&[
            1.0, 2.0, 3.0, 4.0, 5.0,
        ])));
        let aggregator = RollingAggregator::new();
        for value in [1.0, 2.0, 2.0, 3.0, 5.0] {
            histogram.record(value);
            aggregator.record_non_negative(value);
        }

        let snapshot = HistogramSnapshot::assemble(&histogram, &aggregator, &config);
        assert_eq!(snapshot.count(), 5);
        assert_eq!(snapshot.total(), 13.0);
        assert_eq!(snapshot.max(), 5.0);
        assert_relative_eq!(snapshot.mean(), 2.6);
        assert_eq!(snapshot.histogram_counts().len(), 6);
        assert_eq!(snapshot.percentile_values()[0].quantile().label(), "p50");
        assert_eq!(snapshot.percentile_values()[0].percentile(), 0.5);
        // Ranks 3 and 5 out of 5.
        assert_eq!(estimates(&snapshot), vec![2.0, 5.0]);
    }

    #[test]
    fn test_no_percentiles_configured() {
        let (counts, aggregate) = parts(&[1.0], &[0.5]);
        let snapshot = HistogramSnapshot::from_parts(counts, aggregate, &[]);
        assert!(snapshot.percentile_values().is_empty());
    }

    #[test]
    fn test_percentile_edges() {
        let quantiles = [Quantile::new(0.0), Quantile::new(1.0)];

        let (counts, aggregate) = parts(&[10.0, 20.0], &[]);
        let snapshot = HistogramSnapshot::from_parts(counts, aggregate, &quantiles);
        assert!(snapshot.is_empty());
        assert_eq!(estimates(&snapshot), vec![0.0, 0.0]);

        // The minimum rank is one: the smallest populated bucket, not the smallest bucket.
        let (counts, aggregate) = parts(&[10.0, 20.0], &[15.0, 17.0]);
        let snapshot = HistogramSnapshot::from_parts(counts, aggregate, &quantiles);
        assert_eq!(estimates(&snapshot), vec![20.0, 20.0]);

        // Samples beyond the last finite boundary are estimated by the maximum.
        let (counts, aggregate) = parts(&[10.0, 20.0], &[5.0, 250.0]);
        let snapshot = HistogramSnapshot::from_parts(counts, aggregate, &quantiles);
        assert_eq!(estimates(&snapshot), vec![10.0, 250.0]);
    }

    #[test]
    fn test_ranks_are_not_inflated_by_rounding() {
        let bounds = (1..=100).map(f64::from).collect::<Vec<_>>();
        let (counts, aggregate) = parts(&bounds, &bounds);

        // Each of these products lands just above an integer in floating point.
        let quantiles = [0.07, 0.14, 0.55].map(Quantile::new);
        let snapshot = HistogramSnapshot::from_parts(counts, aggregate, &quantiles);
        assert_eq!(estimates(&snapshot), vec![7.0, 14.0, 55.0]);

        let (counts, aggregate) = parts(&bounds, &bounds);
        let quantiles = [0.071, 0.999, 1.0].map(Quantile::new);
        let snapshot = HistogramSnapshot::from_parts(counts, aggregate, &quantiles);
        assert_eq!(estimates(&snapshot), vec![8.0, 100.0, 100.0]);
    }

    #[test]
    fn test_median_of_uniform_values() {
        let bounds = (1..=20).map(|b| f64::from(b) * 50.0).collect::<Vec<_>>();
        let values = (0..1_000).map(f64::from).collect::<Vec<_>>();
        let (counts, aggregate) = parts(&bounds, &values);

        let snapshot = HistogramSnapshot::from_parts(counts, aggregate, &[Quantile::new(0.5)]);
        let median = estimates(&snapshot)[0];

        // The true median is 499.5, which sits between the boundaries 450 and 500.
        assert!((450.0..=500.0).contains(&median), "median estimate {} out of range", median);
    }

    #[test]
    fn test_unit_conversion() {
        let (counts, aggregate) = parts(&[1.0, 2.0], &[0.25, 1.5]);
        let snapshot = HistogramSnapshot::from_parts(counts, aggregate, &[Quantile::new(0.5)])
            .with_base_unit(Some(TimeUnit::Seconds));

        assert_eq!(snapshot.base_unit(), Some(TimeUnit::Seconds));
        assert_eq!(snapshot.total_in(TimeUnit::Milliseconds), 1_750.0);
        assert_eq!(snapshot.max_in(TimeUnit::Milliseconds), 1_500.0);
        assert_eq!(snapshot.mean_in(TimeUnit::Milliseconds), 875.0);
        assert_eq!(
            TimeUnit::Milliseconds.convert(snapshot.total_in(TimeUnit::Milliseconds), TimeUnit::Seconds),
            snapshot.total()
        );
        assert_eq!(snapshot.histogram_counts_in(TimeUnit::Milliseconds)[1].bucket(), 2_000.0);
        assert_eq!(snapshot.percentile_values_in(TimeUnit::Milliseconds)[0].value(), 1_000.0);

        let unitless = HistogramSnapshot::from_parts(Vec::new(), aggregate, &[]);
        assert_eq!(unitless.total_in(TimeUnit::Milliseconds), 1.75);
    }

    #[test]
    fn test_display() {
        let (counts, aggregate) = parts(&[4.0], &[3.0]);
        let snapshot = HistogramSnapshot::from_parts(counts, aggregate, &[Quantile::new(0.99)]);
        let output = snapshot.to_string();

        assert!(output.starts_with("        Bucket TotalCount\n\n"));
        assert!(output.contains("           4.0          1\n"));
        assert!(output.contains("           inf          1\n"));
        assert!(output.ends_with("count=1 total=3 max=3 p99=4"));
    }

    #[test]
    fn test_empty() {
        let snapshot = HistogramSnapshot::empty(BoundarySet::new(&[5.0]).iter());
        assert_eq!(
            snapshot.histogram_counts(),
            &[CountAtBucket::new(5.0, 0), CountAtBucket::new(f64::INFINITY, 0)]
        );
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.mean(), 0.0);
    }
}
