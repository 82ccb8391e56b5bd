use std::sync::atomic::{AtomicU64, Ordering};

/// Running total of consumed capacity units
///
/// Shared by every batch of a run. The total is an `f64` stored as bits in an
/// `AtomicU64`, so concurrent batches can add without a lock; addition order
/// is not significant.
#[derive(Debug, Default)]
pub struct CapacityAggregator {
    bits: AtomicU64,
}

impl CapacityAggregator {
    /// Start a new total at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add units reported by one store call
    ///
    /// Non-finite values are ignored.
    pub fn add(&self, units: f64) {
        if units == 0.0 || !units.is_finite() {
            return;
        }

        let _ = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + units).to_bits())
            });
    }

    /// Current total, without resetting it
    pub fn snapshot(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}
