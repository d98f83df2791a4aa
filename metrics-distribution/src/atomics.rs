//! Atomic types used for distribution storage.
//!
//! Counters are plain 64-bit atomic integers, and floating-point accumulators (totals, maxima,
//! minima) are stored as the bit pattern of an `f64` inside the same 64-bit atomic integer.
//!
//! We always require an atomic integer of 64 bits regardless of whether the standard library
//! exposes one for the target architecture, so on 32-bit targets the type comes from
//! `portable-atomic`.

use std::sync::atomic::Ordering;

#[cfg(target_pointer_width = "32")]
pub use portable_atomic::AtomicU64;
#[cfg(not(target_pointer_width = "32"))]
pub use std::sync::atomic::AtomicU64;

/// An `f64` stored as its bit pattern in an [`AtomicU64`].
#[derive(Debug)]
pub(crate) struct AtomicF64 {
    inner: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> AtomicF64 {
        AtomicF64 { inner: AtomicU64::new(value.to_bits()) }
    }

    pub fn load(&self, order: Ordering) -> f64 {
        f64::from_bits(self.inner.load(order))
    }

    pub fn store(&self, value: f64, order: Ordering) {
        self.inner.store(value.to_bits(), order);
    }

    /// Adds `value` to the current value.
    pub fn add(&self, value: f64) {
        let _ = self.inner.fetch_update(Ordering::AcqRel, Ordering::Relaxed, |curr| {
            let input = f64::from_bits(curr);
            let output = input + value;
            Some(output.to_bits())
        });
    }

    /// Raises the current value to at least `value`.
    ///
    /// Both the current value and `value` must be non-negative: for non-negative floats, the
    /// ordering of the bit patterns matches the ordering of the values, so this reduces to an
    /// integer `fetch_max`.
    pub fn max(&self, value: f64) {
        debug_assert!(value.is_sign_positive());
        let _ = self.inner.fetch_max(value.to_bits(), Ordering::AcqRel);
    }

    /// Lowers the current value to at most `value`.
    ///
    /// Same non-negative requirement as [`max`](AtomicF64::max).
    pub fn min(&self, value: f64) {
        debug_assert!(value.is_sign_positive());
        let _ = self.inner.fetch_min(value.to_bits(), Ordering::AcqRel);
    }
}

/// Normalizes an observation, returning `None` if it must be dropped.
///
/// Negative values and NaN are dropped.  Negative zero is folded into positive zero so that the
/// bit-pattern ordering used by [`AtomicF64::max`] and [`AtomicF64::min`] holds.
pub(crate) fn non_negative(value: f64) -> Option<f64> {
    if value.is_nan() || value < 0.0 {
        None
    } else if value == 0.0 {
        Some(0.0)
    } else {
        Some(value)
    }
}
