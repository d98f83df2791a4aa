//! Concurrent distribution statistics for the metrics ecosystem.
//!
//! This crate turns a stream of recorded values, such as latencies or payload sizes, into
//! immutable snapshots holding counts, totals, maxima, percentile estimates, and cumulative bucket
//! counts.  Recording never blocks, and snapshots can be taken from any thread at any time.
//!
//! The building blocks are:
//!
//! - [`BoundarySet`], resolved from a [`DistributionStatisticConfig`], which decides which bucket
//!   boundaries a histogram tracks;
//! - [`CumulativeBucketHistogram`], which counts the samples at or below each boundary;
//! - [`RollingAggregator`], which tracks count, minimum, maximum, and total over a window;
//! - [`HistogramSnapshot`], which assembles both into the view handed to exporters;
//! - [`TimeWindowMax`] and [`TimeWindowHistogram`], which decay over a trailing window of time.
//!
//! [`Distribution`] composes all of them behind a single type, for either a cumulative or a step
//! [`Horizon`], and can back a [`metrics::Histogram`] handle.
//!
//! # Example
//!
//! ```rust
//! use metrics_distribution::{Distribution, DistributionStatisticConfig, Horizon};
//!
//! let config = DistributionStatisticConfig::builder()
//!     .service_level_objectives(&[100.0, 500.0])
//!     .percentiles(&[0.5, 0.99])
//!     .build()
//!     .expect("invalid configuration");
//! let distribution = Distribution::new(config, Horizon::Cumulative, None)
//!     .expect("invalid configuration");
//!
//! distribution.record(42.0);
//! distribution.record(420.0);
//!
//! let snapshot = distribution.snapshot();
//! assert_eq!(snapshot.count(), 2);
//! assert_eq!(snapshot.total(), 462.0);
//! ```
#![deny(missing_docs)]

mod atomics;
mod shard;

mod common;
pub use common::ConfigurationError;

mod quantile;
pub use quantile::{parse_quantiles, Quantile};

mod unit;
pub use unit::TimeUnit;

mod config;
pub use config::{BucketLayout, DistributionStatisticConfig, DistributionStatisticConfigBuilder};

mod boundary;
pub use boundary::{configure, BoundarySet};

mod histogram;
pub use histogram::CumulativeBucketHistogram;

mod aggregator;
pub use aggregator::{AggregateSnapshot, RollingAggregator};

mod snapshot;
pub use snapshot::{CountAtBucket, HistogramSnapshot, ValueAtPercentile};

mod window;
pub use window::TimeWindowHistogram;

mod max;
pub use max::TimeWindowMax;

mod distribution;
pub use distribution::{Distribution, Horizon};
