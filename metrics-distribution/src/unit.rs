use std::fmt;
use std::time::Duration;

/// Unit of time that a time distribution is recorded in.
///
/// Snapshots of time distributions keep every value in a single base unit. Conversion to another
/// unit happens at read time and is a pure linear scaling.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum TimeUnit {
    /// Nanoseconds.
    Nanoseconds,
    /// Microseconds.
    Microseconds,
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    /// Length of one unit, in nanoseconds.
    fn nanos(self) -> u64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60_000_000_000,
            TimeUnit::Hours => 3_600_000_000_000,
            TimeUnit::Days => 86_400_000_000_000,
        }
    }

    /// Converts `value`, expressed in `self`, into `destination`.
    ///
    /// The ratio between two units is always an exact integer, so converting to a finer unit
    /// multiplies and converting to a coarser unit divides; converting back and forth only
    /// accumulates floating-point rounding, never a lossy intermediate ratio.
    pub fn convert(self, value: f64, destination: TimeUnit) -> f64 {
        let (from, to) = (self.nanos(), destination.nanos());
        if from >= to {
            value * (from / to) as f64
        } else {
            value / (to / from) as f64
        }
    }

    /// Expresses `duration` in this unit.
    pub fn from_duration(self, duration: Duration) -> f64 {
        TimeUnit::Nanoseconds.convert(duration.as_nanos() as f64, self)
    }

    /// Gets the short, canonical suffix for this unit, such as `ms`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
