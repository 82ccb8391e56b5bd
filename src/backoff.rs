use std::time::Duration;

/// Exponential backoff: the delay before retry `n` (0-based) is `base * 2^n`
///
/// Shared by the batch dispatcher and the table poller, each keeping its own
/// attempt counter. Delays saturate at [`Duration::MAX`] instead of
/// overflowing, and are clamped to `max` when one is set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first retry
    pub base: Duration,
    /// Upper bound on any single delay
    pub max: Option<Duration>,
}

impl Backoff {
    /// Uncapped backoff starting at `base`
    pub const fn new(base: Duration) -> Self {
        Self { base, max: None }
    }

    /// Cap every delay at `max`
    pub const fn with_max(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }

    /// Calculate the delay to wait before retry `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let delay = self.base.checked_mul(factor).unwrap_or(Duration::MAX);

        match self.max {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}
