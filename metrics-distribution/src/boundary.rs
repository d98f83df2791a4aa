//! Resolution of bucket boundaries from a distribution configuration.
use tracing::debug;

use crate::{BucketLayout, ConfigurationError, DistributionStatisticConfig, TimeUnit};

/// An ordered set of histogram bucket boundaries.
///
/// Boundaries are strictly increasing, non-negative, and the set always ends with
/// `f64::INFINITY`, which stands for "no upper limit".  A set is immutable once resolved and is
/// meant to be shared, behind an `Arc`, by every histogram built from the same configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundarySet {
    bounds: Vec<f64>,
}

impl BoundarySet {
    /// Creates a boundary set from arbitrary boundaries.
    ///
    /// Negative and NaN boundaries are discarded, the rest are sorted and deduplicated, and the
    /// infinity sentinel is appended if it is not already present.
    pub fn new(bounds: &[f64]) -> BoundarySet {
        let mut bounds = bounds
            .iter()
            .copied()
            .filter(|b| !b.is_nan() && *b >= 0.0)
            // Fold negative zero into zero so it deduplicates.
            .map(|b| b + 0.0)
            .collect::<Vec<_>>();
        bounds.sort_by(|a, b| a.total_cmp(b));
        bounds.dedup();

        if bounds.last() != Some(&f64::INFINITY) {
            bounds.push(f64::INFINITY);
        }

        BoundarySet { bounds }
    }

    /// Resolves the boundaries described by `config`.
    ///
    /// Service level objective boundaries are included as-is, restricted to the expected value
    /// range when both ends of it are configured.  Percentile histogram buckets are generated,
    /// following the configured [`BucketLayout`], when the configuration asks for a percentile
    /// histogram or for percentiles.
    ///
    /// With neither, the set only holds the infinity sentinel: the histogram then tracks nothing
    /// beyond the total count.
    ///
    /// # Errors
    ///
    /// Fails if percentile buckets are required but the expected value range is inverted, or if
    /// the bucket layout cannot produce any boundary.
    pub fn resolve(config: &DistributionStatisticConfig) -> Result<BoundarySet, ConfigurationError> {
        BoundarySet::resolve_in(config, None)
    }

    /// Resolves the boundaries described by `config`, for a distribution of durations recorded
    /// in `unit`.
    ///
    /// Works like [`resolve`](BoundarySet::resolve), except that the [`BucketLayout::Percentile`]
    /// ladder is laid out in nanoseconds and then scaled into `unit`, so that a distribution
    /// recorded in seconds still gets sub-second boundaries.  Every other boundary, and the
    /// expected value range, are taken to be in `unit` already.
    pub fn resolve_in(
        config: &DistributionStatisticConfig,
        unit: Option<TimeUnit>,
    ) -> Result<BoundarySet, ConfigurationError> {
        let min = config.minimum_expected_value();
        let max = config.maximum_expected_value();
        let mut bounds = Vec::new();

        if config.needs_percentile_buckets() {
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(ConfigurationError::InvalidExpectedRange { min, max });
                }
            }

            let layout = config.bucket_layout().unwrap_or(BucketLayout::Percentile);
            bounds.extend(generate(layout, min, max, unit)?);
        }

        if let Some(slos) = config.service_level_objectives() {
            let in_range = |slo: &f64| match (min, max) {
                (Some(min), Some(max)) => *slo >= min && *slo <= max,
                _ => true,
            };
            bounds.extend(slos.iter().copied().filter(in_range));
        }

        let set = BoundarySet::new(&bounds);
        debug!(buckets = set.len(), finite = set.has_breakdown(), "resolved histogram boundaries");
        Ok(set)
    }

    /// Gets the boundaries, in ascending order, ending with `f64::INFINITY`.
    pub fn as_slice(&self) -> &[f64] {
        &self.bounds
    }

    /// Iterates the boundaries in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.bounds.iter().copied()
    }

    /// Gets the number of boundaries, including the infinity sentinel.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Whether the set holds any boundary besides the infinity sentinel.
    pub fn has_breakdown(&self) -> bool {
        self.bounds.len() > 1
    }

    /// Gets the index of the first boundary greater than or equal to `value`.
    ///
    /// Every boundary from that index onwards counts `value` in a cumulative histogram.
    pub(crate) fn first_at_or_above(&self, value: f64) -> usize {
        self.bounds.partition_point(|b| *b < value)
    }
}

/// Resolves a configuration into its boundary set.
pub fn configure(config: &DistributionStatisticConfig) -> Result<BoundarySet, ConfigurationError> {
    BoundarySet::resolve(config)
}

fn generate(
    layout: BucketLayout,
    min: Option<f64>,
    max: Option<f64>,
    unit: Option<TimeUnit>,
) -> Result<Vec<f64>, ConfigurationError> {
    match layout {
        BucketLayout::Percentile => {
            let min = min.unwrap_or(0.0);
            let max = max.unwrap_or(f64::INFINITY);
            let mut bounds = percentile_ladder()
                .into_iter()
                .map(|b| unit.map_or(b, |unit| TimeUnit::Nanoseconds.convert(b, unit)))
                .filter(|b| *b >= min && *b <= max)
                .collect::<Vec<_>>();
            bounds.push(min);
            bounds.push(max);
            Ok(bounds)
        }
        BucketLayout::Linear { start, width, count } => {
            if count == 0 {
                return Err(ConfigurationError::InvalidBucketLayout("count must be greater than 0"));
            }
            if !(start >= 0.0) || !start.is_finite() {
                return Err(ConfigurationError::InvalidBucketLayout(
                    "linear start must be finite and non-negative",
                ));
            }
            if !(width > 0.0) || !width.is_finite() {
                return Err(ConfigurationError::InvalidBucketLayout(
                    "linear width must be finite and greater than 0",
                ));
            }

            Ok((0..count).map(|i| start + width * i as f64).collect())
        }
        BucketLayout::Exponential { start, factor, count } => {
            if count == 0 {
                return Err(ConfigurationError::InvalidBucketLayout("count must be greater than 0"));
            }
            if !(start > 0.0) || !start.is_finite() {
                return Err(ConfigurationError::InvalidBucketLayout(
                    "exponential start must be finite and greater than 0",
                ));
            }
            if !(factor > 1.0) || !factor.is_finite() {
                return Err(ConfigurationError::InvalidBucketLayout(
                    "exponential factor must be finite and greater than 1",
                ));
            }

            let mut bounds = Vec::with_capacity(count);
            let mut current = start;
            for _ in 0..count {
                bounds.push(current);
                current *= factor;
            }
            Ok(bounds)
        }
    }
}

/// The fixed ladder behind [`BucketLayout::Percentile`].
///
/// Each power of four is split into three linear steps, which keeps the relative error of a
/// bucket-based percentile estimate roughly constant across the whole range.
fn percentile_ladder() -> Vec<f64> {
    let mut bounds = vec![1.0, 2.0, 3.0];

    // The power of four starting at 2^62 would overflow its own upper edge, and contributes no
    // boundary besides the final sentinel.
    let mut exp = 2;
    while exp < 62 {
        let mut current = 1u64 << exp;
        let delta = current / 3;
        let next = (current << 2) - delta;
        while current < next {
            bounds.push(current as f64);
            current += delta;
        }
        exp += 2;
    }

    bounds.push(i64::MAX as f64);
    bounds
}
