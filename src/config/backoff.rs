//! Exponential backoff with jitter.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use rand::Rng;

// ============================================================================
// BackoffPolicy
// ============================================================================

/// Exponential retry delay: `base * factor^attempt`, capped.
///
/// With jitter enabled the delay is drawn uniformly from the upper half of
/// the computed value, so concurrent retriers spread out without ever
/// retrying sooner than half the nominal delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Growth factor per attempt.
    pub factor: f64,
    /// Upper bound for any single delay.
    pub cap: Duration,
    /// Randomize within the upper half of each delay.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(250),
            factor: 2.0,
            cap: Duration::from_secs(4),
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// A policy that never waits.
    #[inline]
    #[must_use]
    pub const fn none() -> Self {
        Self {
            base: Duration::ZERO,
            factor: 1.0,
            cap: Duration::ZERO,
            jitter: false,
        }
    }

    /// Disables jitter.
    #[inline]
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Nominal (un-jittered) delay for the zero-based `attempt`.
    #[must_use]
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.base.as_secs_f64() * 1000.0 * self.factor.powi(exponent);
        let cap = self.cap.as_secs_f64() * 1000.0;
        Duration::from_millis(millis.min(cap).max(0.0).round() as u64)
    }

    /// Delay to sleep before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);
        if !self.jitter || nominal.is_zero() {
            return nominal;
        }

        let half = nominal / 2;
        let spread = (nominal - half).as_millis() as u64;
        half + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns an error message if the factor is below 1 or not finite, or
    /// the cap is below the base.
    pub fn validate(&self) -> Result<(), String> {
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(format!("Backoff factor must be >= 1, got {}", self.factor));
        }
        if self.cap < self.base {
            return Err("Backoff cap must not be smaller than its base delay".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
