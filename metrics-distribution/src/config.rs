//! Distribution statistic configuration.
use std::time::Duration;

use crate::{parse_quantiles, ConfigurationError, Quantile, TimeUnit};

/// How percentile histogram buckets are generated.
///
/// Percentile histogram buckets are only generated when a configuration asks for a percentile
/// histogram, or for percentiles, which are always estimated from buckets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BucketLayout {
    /// A fixed ladder of boundaries suitable for aggregable percentile approximations: `1`, `2`,
    /// `3`, and then each power of four split into three linear steps, up to `i64::MAX`.
    ///
    /// The ladder is filtered down to the minimum and maximum expected values, which are
    /// themselves added as boundaries.
    Percentile,

    /// `count` boundaries of equal width: `start`, `start + width`, `start + 2 * width`, ...
    Linear {
        /// First boundary.
        start: f64,
        /// Distance between two boundaries.
        width: f64,
        /// Number of boundaries.
        count: usize,
    },

    /// `count` exponentially spaced boundaries: `start`, `start * factor`, `start * factor^2`, ...
    Exponential {
        /// First boundary.
        start: f64,
        /// Growth factor between two boundaries.
        factor: f64,
        /// Number of boundaries.
        count: usize,
    },
}

/// Configures the distribution statistics of a timer or distribution summary.
///
/// These statistics include max, percentiles, percentile histograms, and SLO bucket counts.
///
/// Every option is optional: a configuration built by a user typically only sets a handful of
/// them, and is then [merged](DistributionStatisticConfig::merge) over library-wide defaults so
/// that unset options are filled in without overriding explicit choices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DistributionStatisticConfig {
    percentile_histogram: Option<bool>,
    percentiles: Option<Vec<Quantile>>,
    percentile_precision: Option<u32>,
    service_level_objectives: Option<Vec<f64>>,
    minimum_expected_value: Option<f64>,
    maximum_expected_value: Option<f64>,
    expiry: Option<Duration>,
    buffer_length: Option<u32>,
    bucket_layout: Option<BucketLayout>,
}

impl DistributionStatisticConfig {
    /// Creates a [`DistributionStatisticConfigBuilder`].
    pub fn builder() -> DistributionStatisticConfigBuilder {
        DistributionStatisticConfigBuilder::default()
    }

    /// A configuration with nothing set.
    pub fn none() -> DistributionStatisticConfig {
        DistributionStatisticConfig::default()
    }

    /// Library-wide defaults.
    ///
    /// No percentile histogram, a percentile precision of 1, an expected range of `[1, +inf]`, an
    /// expiry of two minutes spread over a ring buffer of three windows, and the
    /// [`BucketLayout::Percentile`] ladder.
    pub fn default_config() -> DistributionStatisticConfig {
        DistributionStatisticConfig {
            percentile_histogram: Some(false),
            percentiles: None,
            percentile_precision: Some(1),
            service_level_objectives: None,
            minimum_expected_value: Some(1.0),
            maximum_expected_value: Some(f64::INFINITY),
            expiry: Some(Duration::from_secs(120)),
            buffer_length: Some(3),
            bucket_layout: Some(BucketLayout::Percentile),
        }
    }

    /// Library-wide defaults for distributions of durations recorded in `unit`.
    ///
    /// Same as [`default_config`](Self::default_config), except for an expected range of one
    /// millisecond to thirty seconds, expressed in `unit`.
    pub fn default_time_config(unit: TimeUnit) -> DistributionStatisticConfig {
        DistributionStatisticConfig {
            minimum_expected_value: Some(TimeUnit::Milliseconds.convert(1.0, unit)),
            maximum_expected_value: Some(TimeUnit::Seconds.convert(30.0, unit)),
            ..DistributionStatisticConfig::default_config()
        }
    }

    /// Merges two configurations.
    ///
    /// Options set in `self` take precedence; any option unset in `self` is taken from
    /// `fallback`.
    pub fn merge(&self, fallback: &DistributionStatisticConfig) -> DistributionStatisticConfig {
        DistributionStatisticConfig {
            percentile_histogram: self.percentile_histogram.or(fallback.percentile_histogram),
            percentiles: self.percentiles.clone().or_else(|| fallback.percentiles.clone()),
            percentile_precision: self.percentile_precision.or(fallback.percentile_precision),
            service_level_objectives: self
                .service_level_objectives
                .clone()
                .or_else(|| fallback.service_level_objectives.clone()),
            minimum_expected_value: self.minimum_expected_value.or(fallback.minimum_expected_value),
            maximum_expected_value: self.maximum_expected_value.or(fallback.maximum_expected_value),
            expiry: self.expiry.or(fallback.expiry),
            buffer_length: self.buffer_length.or(fallback.buffer_length),
            bucket_layout: self.bucket_layout.or(fallback.bucket_layout),
        }
    }

    /// Whether a histogram usable for aggregable percentile approximations was requested.
    pub fn percentile_histogram(&self) -> Option<bool> {
        self.percentile_histogram
    }

    /// Percentiles to compute and publish.
    pub fn percentiles(&self) -> Option<&[Quantile]> {
        self.percentiles.as_deref()
    }

    /// Digits of precision to maintain for percentile approximations.
    ///
    /// Informational only: percentiles here are always estimated from fixed bucket boundaries,
    /// whose density is set by the [`BucketLayout`], so this value is carried along for exporters
    /// and otherwise unused.
    pub fn percentile_precision(&self) -> Option<u32> {
        self.percentile_precision
    }

    /// Service level objective boundaries, always included in the bucket layout.
    pub fn service_level_objectives(&self) -> Option<&[f64]> {
        self.service_level_objectives.as_deref()
    }

    /// The minimum value the meter is expected to observe.
    pub fn minimum_expected_value(&self) -> Option<f64> {
        self.minimum_expected_value
    }

    /// The maximum value the meter is expected to observe.
    pub fn maximum_expected_value(&self) -> Option<f64> {
        self.maximum_expected_value
    }

    /// How long samples accumulate into decaying statistics before they are fully expired.
    ///
    /// Decaying statistics rotate through [`buffer_length`](Self::buffer_length) windows, each
    /// lasting `expiry / buffer_length`.
    pub fn expiry(&self) -> Option<Duration> {
        self.expiry
    }

    /// The number of windows retained by decaying statistics.
    pub fn buffer_length(&self) -> Option<u32> {
        self.buffer_length
    }

    /// How percentile histogram buckets are generated.
    pub fn bucket_layout(&self) -> Option<BucketLayout> {
        self.bucket_layout
    }

    /// Whether any percentile values are published.
    pub fn is_publishing_percentiles(&self) -> bool {
        self.percentiles.as_ref().map_or(false, |p| !p.is_empty())
    }

    /// Whether a bucket histogram is published, either for percentile approximations or for SLO
    /// boundaries.
    pub fn is_publishing_histogram(&self) -> bool {
        self.percentile_histogram == Some(true)
            || self.service_level_objectives.as_ref().map_or(false, |s| !s.is_empty())
    }

    /// Whether percentile histogram buckets have to be generated for this configuration.
    pub(crate) fn needs_percentile_buckets(&self) -> bool {
        self.percentile_histogram == Some(true) || self.is_publishing_percentiles()
    }
}

/// Builder for [`DistributionStatisticConfig`].
///
/// Values are validated when calling [`build`](DistributionStatisticConfigBuilder::build).
#[derive(Clone, Debug, Default)]
pub struct DistributionStatisticConfigBuilder {
    percentile_histogram: Option<bool>,
    percentiles: Option<Vec<f64>>,
    percentile_precision: Option<u32>,
    service_level_objectives: Option<Vec<f64>>,
    minimum_expected_value: Option<f64>,
    maximum_expected_value: Option<f64>,
    expiry: Option<Duration>,
    buffer_length: Option<u32>,
    bucket_layout: Option<BucketLayout>,
}

impl DistributionStatisticConfigBuilder {
    /// Adds histogram buckets used to generate aggregable percentile approximations.
    pub fn percentile_histogram(mut self, enabled: bool) -> Self {
        self.percentile_histogram = Some(enabled);
        self
    }

    /// Percentiles to compute and publish, where the 95th percentile is expressed as `0.95`.
    ///
    /// Percentiles are estimated from the bucket counts, so requesting any also generates
    /// percentile histogram buckets.
    pub fn percentiles(mut self, percentiles: &[f64]) -> Self {
        self.percentiles = Some(percentiles.to_vec());
        self
    }

    /// Digits of precision to maintain for percentile approximations.
    ///
    /// See [`DistributionStatisticConfig::percentile_precision`].
    pub fn percentile_precision(mut self, digits: u32) -> Self {
        self.percentile_precision = Some(digits);
        self
    }

    /// Service level objective boundaries to include in the bucket layout.
    ///
    /// For time distributions, boundaries are in the distribution's base unit.
    pub fn service_level_objectives(mut self, slos: &[f64]) -> Self {
        self.service_level_objectives = Some(slos.to_vec());
        self
    }

    /// The minimum value the meter is expected to observe.
    pub fn minimum_expected_value(mut self, min: f64) -> Self {
        self.minimum_expected_value = Some(min);
        self
    }

    /// The maximum value the meter is expected to observe.
    pub fn maximum_expected_value(mut self, max: f64) -> Self {
        self.maximum_expected_value = Some(max);
        self
    }

    /// How long samples accumulate into decaying statistics before they are fully expired.
    pub fn expiry(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// The number of windows retained by decaying statistics.
    pub fn buffer_length(mut self, buffer_length: u32) -> Self {
        self.buffer_length = Some(buffer_length);
        self
    }

    /// How percentile histogram buckets are generated.
    pub fn bucket_layout(mut self, layout: BucketLayout) -> Self {
        self.bucket_layout = Some(layout);
        self
    }

    /// Validates the options and builds an immutable configuration.
    pub fn build(self) -> Result<DistributionStatisticConfig, ConfigurationError> {
        if let Some(buffer_length) = self.buffer_length {
            if buffer_length == 0 {
                return Err(ConfigurationError::InvalidBufferLength(buffer_length));
            }
        }

        if let Some(precision) = self.percentile_precision {
            if precision == 0 {
                return Err(ConfigurationError::InvalidPercentilePrecision(precision));
            }
        }

        let percentiles = self.percentiles.as_deref().map(parse_quantiles).transpose()?;

        for (name, value) in [
            ("minimumExpectedValue", self.minimum_expected_value),
            ("maximumExpectedValue", self.maximum_expected_value),
        ] {
            if let Some(value) = value {
                // Written to also reject NaN.
                if !(value > 0.0) {
                    return Err(ConfigurationError::NonPositiveExpectedValue { name, value });
                }
            }
        }

        if let (Some(min), Some(max)) = (self.minimum_expected_value, self.maximum_expected_value) {
            if min > max {
                return Err(ConfigurationError::InvalidExpectedRange { min, max });
            }
        }

        if let Some(slos) = &self.service_level_objectives {
            if let Some(slo) = slos.iter().find(|slo| !(**slo > 0.0)) {
                return Err(ConfigurationError::InvalidServiceLevelObjective(*slo));
            }
        }

        Ok(DistributionStatisticConfig {
            percentile_histogram: self.percentile_histogram,
            percentiles,
            percentile_precision: self.percentile_precision,
            service_level_objectives: self.service_level_objectives,
            minimum_expected_value: self.minimum_expected_value,
            maximum_expected_value: self.maximum_expected_value,
            expiry: self.expiry,
            buffer_length: self.buffer_length,
            bucket_layout: self.bucket_layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{BucketLayout, DistributionStatisticConfig};
    use crate::{ConfigurationError, Quantile, TimeUnit};
    use std::time::Duration;

    #[test]
    fn test_merge_prefers_explicit_values() {
        let config = DistributionStatisticConfig::builder()
            .percentiles(&[0.5, 0.95])
            .maximum_expected_value(1_000.0)
            .build()
            .expect("valid config");

        let merged = config.merge(&DistributionStatisticConfig::default_config());
        assert_eq!(merged.percentiles(), Some(&[Quantile::new(0.5), Quantile::new(0.95)][..]));
        assert_eq!(merged.maximum_expected_value(), Some(1_000.0));
        assert_eq!(merged.minimum_expected_value(), Some(1.0));
        assert_eq!(merged.percentile_histogram(), Some(false));
        assert_eq!(merged.expiry(), Some(Duration::from_secs(120)));
        assert_eq!(merged.buffer_length(), Some(3));
        assert_eq!(merged.bucket_layout(), Some(BucketLayout::Percentile));
        assert!(merged.is_publishing_percentiles());
        assert!(!merged.is_publishing_histogram());
    }

    #[test]
    fn test_merge_with_self_is_noop() {
        let config = DistributionStatisticConfig::builder()
            .service_level_objectives(&[10.0, 20.0])
            .percentile_precision(2)
            .bucket_layout(BucketLayout::Linear { start: 1.0, width: 1.0, count: 4 })
            .build()
            .expect("valid config");

        assert_eq!(config.merge(&config), config);

        let defaults = DistributionStatisticConfig::default_config();
        assert_eq!(defaults.merge(&defaults), defaults);

        let none = DistributionStatisticConfig::none();
        assert_eq!(none.merge(&none), none);
    }

    #[test]
    fn test_merge_into_none_keeps_everything() {
        let defaults = DistributionStatisticConfig::default_config();
        assert_eq!(defaults.merge(&DistributionStatisticConfig::none()), defaults);
        assert_eq!(DistributionStatisticConfig::none().merge(&defaults), defaults);
    }

    #[test]
    fn test_time_defaults_follow_the_unit() {
        let seconds = DistributionStatisticConfig::default_time_config(TimeUnit::Seconds);
        assert_eq!(seconds.minimum_expected_value(), Some(0.001));
        assert_eq!(seconds.maximum_expected_value(), Some(30.0));
        assert_eq!(seconds.expiry(), Some(Duration::from_secs(120)));

        let nanos = DistributionStatisticConfig::default_time_config(TimeUnit::Nanoseconds);
        assert_eq!(nanos.minimum_expected_value(), Some(1_000_000.0));
        assert_eq!(nanos.maximum_expected_value(), Some(30_000_000_000.0));
    }

    #[test]
    fn test_validation() {
        let cases = vec![
            (
                DistributionStatisticConfig::builder().buffer_length(0).build(),
                ConfigurationError::InvalidBufferLength(0),
            ),
            (
                DistributionStatisticConfig::builder().percentile_precision(0).build(),
                ConfigurationError::InvalidPercentilePrecision(0),
            ),
            (
                DistributionStatisticConfig::builder().percentiles(&[0.5, 1.5]).build(),
                ConfigurationError::InvalidPercentile(1.5),
            ),
            (
                DistributionStatisticConfig::builder().minimum_expected_value(0.0).build(),
                ConfigurationError::NonPositiveExpectedValue {
                    name: "minimumExpectedValue",
                    value: 0.0,
                },
            ),
            (
                DistributionStatisticConfig::builder()
                    .minimum_expected_value(10.0)
                    .maximum_expected_value(5.0)
                    .build(),
                ConfigurationError::InvalidExpectedRange { min: 10.0, max: 5.0 },
            ),
            (
                DistributionStatisticConfig::builder()
                    .service_level_objectives(&[5.0, -1.0])
                    .build(),
                ConfigurationError::InvalidServiceLevelObjective(-1.0),
            ),
        ];

        for (result, expected) in cases {
            assert_eq!(result, Err(expected));
        }
    }

    #[test]
    fn test_publishing_flags() {
        let none = DistributionStatisticConfig::none();
        assert!(!none.is_publishing_percentiles());
        assert!(!none.is_publishing_histogram());
        assert!(!none.needs_percentile_buckets());

        let slo = DistributionStatisticConfig::builder()
            .service_level_objectives(&[4.0])
            .build()
            .expect("valid config");
        assert!(slo.is_publishing_histogram());
        assert!(!slo.needs_percentile_buckets());

        let histogram = DistributionStatisticConfig::builder()
            .percentile_histogram(true)
            .build()
            .expect("valid config");
        assert!(histogram.is_publishing_histogram());
        assert!(histogram.needs_percentile_buckets());

        let empty_percentiles = DistributionStatisticConfig::builder()
            .percentiles(&[])
            .build()
            .expect("valid config");
        assert!(!empty_percentiles.is_publishing_percentiles());
    }
}
