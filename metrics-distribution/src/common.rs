use thiserror::Error as ThisError;

/// Errors that could occur while resolving a distribution configuration.
///
/// All of these are raised synchronously while building a configuration, a boundary set, or a
/// [`Distribution`](crate::Distribution), and are fatal to that construction: the configuration
/// has to be fixed before trying again.
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum ConfigurationError {
    /// The minimum expected value exceeds the maximum expected value.
    #[error("maximumExpectedValue ({max}) must be equal to or greater than minimumExpectedValue ({min})")]
    InvalidExpectedRange {
        /// Minimum expected value.
        min: f64,
        /// Maximum expected value.
        max: f64,
    },

    /// An expected value bound was zero, negative, or NaN.
    #[error("{name} ({value}) must be greater than 0")]
    NonPositiveExpectedValue {
        /// Which bound was rejected.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A percentile was outside of `[0.0, 1.0]`.
    #[error("percentiles must contain only values between 0.0 and 1.0, found {0}")]
    InvalidPercentile(f64),

    /// A service level objective boundary was zero, negative, or NaN.
    #[error("service level objective boundaries must be greater than 0, found {0}")]
    InvalidServiceLevelObjective(f64),

    /// The ring buffer length was zero.
    #[error("bufferLength ({0}) must be greater than 0")]
    InvalidBufferLength(u32),

    /// The percentile precision was zero.
    #[error("percentilePrecision ({0}) must be greater than 0")]
    InvalidPercentilePrecision(u32),

    /// A generated bucket layout could not produce any boundaries.
    #[error("invalid bucket layout: {0}")]
    InvalidBucketLayout(&'static str),

    /// The expiry is too short to be split across the ring buffer.
    #[error("expiry ({expiry_ms}ms) / bufferLength ({buffer_length}) must be greater than 0")]
    InvalidRotationPeriod {
        /// Expiry, in milliseconds.
        expiry_ms: u128,
        /// Ring buffer length.
        buffer_length: u32,
    },
}
