//! Concurrent cumulative bucket histogram.
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::atomics::{non_negative, AtomicU64};
use crate::shard::{Shard, ShardedCell};
use crate::{BoundarySet, CountAtBucket, HistogramSnapshot};

/// A cumulative bucketed histogram.
///
/// This histogram tracks, for every boundary of its [`BoundarySet`], the number of samples less
/// than or equal to that boundary, rather than exposing any sort of quantiles.  A single sample
/// is therefore counted by every bucket at or above it, and the last bucket, whose boundary is
/// infinity, counts every sample.
///
/// Recording is lock-free and can happen from any number of threads.  Reads never observe a
/// sample partially applied across its buckets, and never observe a sample without also observing
/// every sample recorded before it by the same thread.
///
/// The histogram only tracks bucket counts: the total count, sum, and maximum are provided by the
/// caller when taking a [`snapshot`](CumulativeBucketHistogram::snapshot), usually from a
/// [`RollingAggregator`](crate::RollingAggregator).
#[derive(Debug)]
pub struct CumulativeBucketHistogram {
    bounds: Arc<BoundarySet>,
    cell: ShardedCell<BucketCounts>,
}

impl CumulativeBucketHistogram {
    /// Creates a new `CumulativeBucketHistogram` over the given boundaries.
    pub fn new(bounds: Arc<BoundarySet>) -> CumulativeBucketHistogram {
        let len = bounds.len();
        CumulativeBucketHistogram {
            bounds,
            cell: ShardedCell::new(BucketCounts::new(len), BucketCounts::new(len)),
        }
    }

    /// Gets the boundaries of this histogram.
    pub fn bounds(&self) -> &Arc<BoundarySet> {
        &self.bounds
    }

    /// Records a single sample.
    ///
    /// Negative and NaN samples are ignored.
    pub fn record(&self, sample: f64) {
        self.record_many(sample, 1);
    }

    /// Records the same sample `count` times.
    ///
    /// Negative and NaN samples are ignored.
    pub fn record_many(&self, sample: f64, count: u64) {
        let Some(sample) = non_negative(sample) else {
            return;
        };
        if count == 0 {
            return;
        }

        // Add the sample to every bucket where the value is less than or equal to the bound.
        let first = self.bounds.first_at_or_above(sample);
        self.cell.write(|shard| {
            for bucket in &shard.buckets[first..] {
                bucket.fetch_add(count, Ordering::Relaxed);
            }
        });
    }

    /// Gets the count at each boundary.
    pub fn counts(&self) -> Vec<CountAtBucket> {
        self.pair(&self.cell.read())
    }

    /// Takes a snapshot of the bucket counts, combined with the given totals.
    ///
    /// The returned snapshot carries no percentile values; see
    /// [`HistogramSnapshot::assemble`] for that.
    pub fn snapshot(&self, count: u64, total: f64, max: f64) -> HistogramSnapshot {
        HistogramSnapshot::new(count, total, max, self.counts(), Vec::new())
    }

    /// Zeroes every bucket, returning the counts as they were right before.
    ///
    /// Each concurrent [`record`](CumulativeBucketHistogram::record) lands either entirely in the
    /// returned counts or entirely after the reset.
    pub fn reset(&self) -> Vec<CountAtBucket> {
        self.pair(&self.cell.reset())
    }

    fn pair(&self, counts: &[u64]) -> Vec<CountAtBucket> {
        self.bounds
            .iter()
            .zip(counts.iter().copied())
            .map(|(bucket, count)| CountAtBucket::new(bucket, count))
            .collect()
    }
}

#[derive(Debug)]
struct BucketCounts {
    buckets: Box<[AtomicU64]>,
}

impl BucketCounts {
    fn new(len: usize) -> BucketCounts {
        BucketCounts { buckets: (0..len).map(|_| AtomicU64::new(0)).collect() }
    }
}

impl Shard for BucketCounts {
    type Snapshot = Vec<u64>;

    fn read(&self) -> Vec<u64> {
        self.buckets.iter().map(|b| b.load(Ordering::Acquire)).collect()
    }

    fn merge_into(&self, other: &Self) {
        for (src, dst) in self.buckets.iter().zip(other.buckets.iter()) {
            let value = src.load(Ordering::Acquire);
            if value > 0 {
                dst.fetch_add(value, Ordering::AcqRel);
            }
        }
    }

    fn clear(&self) {
        for bucket in self.buckets.iter() {
            bucket.store(0, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CumulativeBucketHistogram;
    use crate::{BoundarySet, CountAtBucket};
    use quickcheck_macros::quickcheck;
    use std::sync::Arc;

    fn histogram(bounds: &[f64]) -> CumulativeBucketHistogram {
        CumulativeBucketHistogram::new(Arc::new(BoundarySet::new(bounds)))
    }

    fn counts(histogram: &CumulativeBucketHistogram) -> Vec<u64> {
        histogram.counts().iter().map(CountAtBucket::count).collect()
    }

    #[test]
    fn test_histogram() {
        let histogram = histogram(&[10.0, 25.0, 100.0]);
        let values = vec![3.0, 2.0, 6.0, 12.0, 56.0, 82.0, 202.0, 100.0, 29.0];

        for value in &values {
            histogram.record(*value);
        }
        histogram.record(89.0);

        let result = histogram.counts();
        assert_eq!(result.len(), 4);
        assert_eq!(result[0], CountAtBucket::new(10.0, 3));
        assert_eq!(result[1], CountAtBucket::new(25.0, 4));
        assert_eq!(result[2], CountAtBucket::new(100.0, 9));
        assert_eq!(result[3], CountAtBucket::new(f64::INFINITY, 10));
    }

    #[test]
    fn test_invalid_samples_are_ignored() {
        let histogram = histogram(&[1.0, 5.0]);
        histogram.record(-1.0);
        histogram.record(f64::NAN);
        histogram.record(f64::NEG_INFINITY);
        histogram.record_many(2.0, 0);
        assert_eq!(counts(&histogram), vec![0, 0, 0]);

        histogram.record(-0.0);
        histogram.record(f64::INFINITY);
        assert_eq!(counts(&histogram), vec![1, 1, 2]);
    }

    #[test]
    fn test_record_many() {
        let histogram = histogram(&[1.0, 5.0]);
        histogram.record_many(3.0, 7);
        histogram.record(1.0);
        assert_eq!(counts(&histogram), vec![1, 8, 8]);
    }

    #[test]
    fn test_no_breakdown() {
        let histogram = histogram(&[]);
        histogram.record(3.0);
        histogram.record(3_000.0);
        assert_eq!(histogram.counts(), vec![CountAtBucket::new(f64::INFINITY, 2)]);
    }

    #[test]
    fn test_snapshot_folds_in_totals() {
        let histogram = histogram(&[4.0, 5.0, 10.0]);
        histogram.record(1.0);
        histogram.record(7.0);

        let snapshot = histogram.snapshot(2, 8.0, 7.0);
        assert_eq!(snapshot.count(), 2);
        assert_eq!(snapshot.total(), 8.0);
        assert_eq!(snapshot.max(), 7.0);
        assert_eq!(
            snapshot.histogram_counts(),
            &[
                CountAtBucket::new(4.0, 1),
                CountAtBucket::new(5.0, 1),
                CountAtBucket::new(10.0, 2),
                CountAtBucket::new(f64::INFINITY, 2),
            ]
        );
        assert!(snapshot.percentile_values().is_empty());
    }

    #[test]
    fn test_reset() {
        let histogram = histogram(&[4.0, 5.0, 10.0]);
        histogram.record(1.0);
        histogram.record(7.0);

        let frozen = histogram.reset();
        assert_eq!(frozen.iter().map(CountAtBucket::count).collect::<Vec<_>>(), vec![1, 1, 2, 2]);
        assert_eq!(counts(&histogram), vec![0, 0, 0, 0]);

        histogram.record(4.5);
        assert_eq!(counts(&histogram), vec![0, 1, 1, 1]);
    }

    #[quickcheck]
    fn cumulative_counts_match_definition(values: Vec<u16>, bounds: Vec<u16>) -> bool {
        let bounds = bounds.into_iter().map(f64::from).collect::<Vec<_>>();
        let histogram = histogram(&bounds);
        for value in &values {
            histogram.record(f64::from(*value));
        }

        histogram.counts().iter().all(|bucket| {
            let expected = values.iter().filter(|v| f64::from(**v) <= bucket.bucket()).count();
            bucket.count() == expected as u64
        })
    }

    #[quickcheck]
    fn counts_are_monotonic(batches: Vec<Vec<u8>>) -> bool {
        let histogram = histogram(&[8.0, 32.0, 128.0]);
        let mut previous = counts(&histogram);

        for batch in batches {
            for value in batch {
                histogram.record(f64::from(value));
            }

            let current = counts(&histogram);
            let increasing_over_time = previous.iter().zip(&current).all(|(p, c)| p <= c);
            let increasing_over_bounds = current.windows(2).all(|w| w[0] <= w[1]);
            if !increasing_over_time || !increasing_over_bounds {
                return false;
            }
            previous = current;
        }

        true
    }
}
