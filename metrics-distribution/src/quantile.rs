use crate::ConfigurationError;

/// A quantile that has both the raw value and a human-friendly display label.
///
/// Percentiles are configured as quantiles for optimal floating-point precision, but most of the
/// time monitoring systems show them as percentiles in an abbreviated form: `p99`.
///
/// On top of holding the quantile value, we calculate the familiar "p99" style of label, doing the
/// appropriate percentile conversion.  Thus, if you have a quantile of `0.99`, the resulting label
/// is `p99`, and if you have a quantile of `0.999`, the resulting label is `p999`.
///
/// There are two special cases, where we label `0.0` and `1.0` as `min` and `max`, respectively.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantile(f64, String);

impl Quantile {
    /// Creates a new [`Quantile`] from a floating-point value.
    ///
    /// All values are clamped between 0.0 and 1.0.
    pub fn new(quantile: f64) -> Quantile {
        let clamped = quantile.clamp(0.0, 1.0);
        let display = clamped * 100.0;

        let raw_label = format!("{}", clamped);
        let label = match raw_label.as_str() {
            "0" => "min".to_string(),
            "1" => "max".to_string(),
            _ => {
                let raw = format!("p{}", display);
                raw.replace('.', "")
            }
        };

        Quantile(clamped, label)
    }

    /// Creates a new [`Quantile`], rejecting values outside of `[0.0, 1.0]` instead of clamping.
    pub fn try_new(quantile: f64) -> Result<Quantile, ConfigurationError> {
        if !(0.0..=1.0).contains(&quantile) {
            return Err(ConfigurationError::InvalidPercentile(quantile));
        }

        Ok(Quantile::new(quantile))
    }

    /// Gets the human-friendly display label.
    pub fn label(&self) -> &str {
        self.1.as_str()
    }

    /// Gets the raw quantile value.
    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Parses a slice of floating-point values into a vector of [`Quantile`]s.
///
/// Fails on the first value outside of `[0.0, 1.0]`.
pub fn parse_quantiles(quantiles: &[f64]) -> Result<Vec<Quantile>, ConfigurationError> {
    quantiles.iter().map(|f| Quantile::try_new(*f)).collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_quantiles, Quantile};
    use crate::ConfigurationError;

    #[test]
    fn test_quantiles() {
        let min = Quantile::new(0.0);
        assert_eq!(min.value(), 0.0);
        assert_eq!(min.label(), "min");

        let max = Quantile::new(1.0);
        assert_eq!(max.value(), 1.0);
        assert_eq!(max.label(), "max");

        let p50 = Quantile::new(0.5);
        assert_eq!(p50.value(), 0.5);
        assert_eq!(p50.label(), "p50");

        let p999 = Quantile::new(0.999);
        assert_eq!(p999.value(), 0.999);
        assert_eq!(p999.label(), "p999");

        let under = Quantile::new(-1.0);
        assert_eq!(under.value(), 0.0);
        assert_eq!(under.label(), "min");
    }

    #[test]
    fn test_try_new_rejects_out_of_range() {
        assert_eq!(Quantile::try_new(1.2), Err(ConfigurationError::InvalidPercentile(1.2)));
        assert!(Quantile::try_new(f64::NAN).is_err());
        assert_eq!(Quantile::try_new(0.95).map(|q| q.value()), Ok(0.95));
    }

    #[test]
    fn test_parse_quantiles() {
        let result = parse_quantiles(&[]).expect("empty input is valid");
        assert_eq!(result.len(), 0);

        let result = parse_quantiles(&[0.0, 0.5, 0.99, 1.0]).expect("all within range");
        assert_eq!(result.len(), 4);
        assert_eq!(result[0], Quantile::new(0.0));
        assert_eq!(result[2], Quantile::new(0.99));

        assert!(parse_quantiles(&[0.5, -0.1]).is_err());
    }
}
