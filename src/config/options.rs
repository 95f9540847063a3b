//! Session, input timing and capture options.
//!
//! Every struct has production defaults via [`Default`] and `with_*`
//! builder methods.
//!
//! # Example
//!
//! ```ignore
//! use tab_autopilot::config::{InputTiming, SessionOptions};
//!
//! let session = SessionOptions::new().with_attach_retries(5);
//! let timing = InputTiming::immediate();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use super::BackoffPolicy;

// ============================================================================
// SessionOptions
// ============================================================================

/// Attachment and command retry behaviour of a protocol session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Attach attempts before giving up.
    pub attach_retries: u32,
    /// Default retry budget per command.
    pub command_retries: u32,
    /// Delay schedule between attempts.
    pub backoff: BackoffPolicy,
    /// Delay before reattaching after a load-complete event.
    pub reattach_delay: Duration,
    /// Delay before the second reattach attempt.
    pub reattach_fallback_delay: Duration,
    /// Delay before resubmitting a command after a successful reattach.
    pub resubmit_delay: Duration,
    /// Completed commands between consolidated stats reports.
    pub stats_log_interval: u64,
    /// Recent errors kept per method.
    pub error_history: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            attach_retries: 3,
            command_retries: 2,
            backoff: BackoffPolicy::default(),
            reattach_delay: Duration::from_millis(100),
            reattach_fallback_delay: Duration::from_millis(500),
            resubmit_delay: Duration::from_millis(100),
            stats_log_interval: 50,
            error_history: 10,
        }
    }
}

impl SessionOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with every delay zeroed. Retry budgets are unchanged.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            backoff: BackoffPolicy::none(),
            reattach_delay: Duration::ZERO,
            reattach_fallback_delay: Duration::ZERO,
            resubmit_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Sets the attach retry budget.
    #[inline]
    #[must_use]
    pub fn with_attach_retries(mut self, retries: u32) -> Self {
        self.attach_retries = retries;
        self
    }

    /// Sets the default command retry budget.
    #[inline]
    #[must_use]
    pub fn with_command_retries(mut self, retries: u32) -> Self {
        self.command_retries = retries;
        self
    }

    /// Sets the backoff policy.
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the stats report interval.
    #[inline]
    #[must_use]
    pub fn with_stats_log_interval(mut self, interval: u64) -> Self {
        self.stats_log_interval = interval;
        self
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.attach_retries == 0 {
            return Err("attach_retries must be at least 1".to_string());
        }
        if self.error_history == 0 {
            return Err("error_history must be at least 1".to_string());
        }
        self.backoff.validate()
    }
}

// ============================================================================
// InputTiming
// ============================================================================

/// Delays and step counts used when synthesizing input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputTiming {
    /// Gap between press and release of a single click.
    pub click_gap: Duration,
    /// Gap between the two clicks of a double click.
    pub double_click_gap: Duration,
    /// Gap between the clicks of a triple click.
    pub triple_click_gap: Duration,
    /// Interpolated moves per drag.
    pub drag_steps: u32,
    /// Pause after pressing before a drag starts moving.
    pub drag_start_pause: Duration,
    /// Gap between drag moves.
    pub drag_step_delay: Duration,
    /// Wheel delta per scroll notch.
    pub scroll_delta: f64,
    /// Pause after each wheel event.
    pub scroll_pause: Duration,
    /// Delay before auto-repeat starts while holding a key.
    pub hold_initial_delay: Duration,
    /// Auto-repeat interval while holding a key.
    pub hold_repeat_interval: Duration,
}

impl Default for InputTiming {
    fn default() -> Self {
        Self {
            click_gap: Duration::from_millis(50),
            double_click_gap: Duration::from_millis(150),
            triple_click_gap: Duration::from_millis(100),
            drag_steps: 10,
            drag_start_pause: Duration::from_millis(50),
            drag_step_delay: Duration::from_millis(20),
            scroll_delta: 100.0,
            scroll_pause: Duration::from_millis(50),
            hold_initial_delay: Duration::from_millis(500),
            hold_repeat_interval: Duration::from_millis(40),
        }
    }
}

impl InputTiming {
    /// Timing with every delay zeroed. Step counts and deltas are unchanged.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            click_gap: Duration::ZERO,
            double_click_gap: Duration::ZERO,
            triple_click_gap: Duration::ZERO,
            drag_start_pause: Duration::ZERO,
            drag_step_delay: Duration::ZERO,
            scroll_pause: Duration::ZERO,
            hold_initial_delay: Duration::ZERO,
            hold_repeat_interval: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Validates the timing.
    ///
    /// # Errors
    ///
    /// Returns error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.drag_steps == 0 {
            return Err("drag_steps must be at least 1".to_string());
        }
        if !self.scroll_delta.is_finite() || self.scroll_delta <= 0.0 {
            return Err("scroll_delta must be a positive number".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// CaptureOptions
// ============================================================================

/// Screenshot capture and normalization settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    /// Canvas width screenshots are normalized to.
    pub canvas_width: u32,
    /// Canvas height screenshots are normalized to.
    pub canvas_height: u32,
    /// Capture attempts before giving up.
    pub attempts: u32,
    /// Delay between capture attempts.
    pub retry_delay: Duration,
    /// Device pixel ratio assumed when the page does not report one.
    pub fallback_device_pixel_ratio: f64,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            canvas_width: 1024,
            canvas_height: 768,
            attempts: 5,
            retry_delay: Duration::from_millis(500),
            fallback_device_pixel_ratio: 1.25,
        }
    }
}

impl CaptureOptions {
    /// Sets the canvas size.
    #[inline]
    #[must_use]
    pub fn with_canvas(mut self, width: u32, height: u32) -> Self {
        self.canvas_width = width;
        self.canvas_height = height;
        self
    }

    /// Removes the delay between capture attempts.
    #[inline]
    #[must_use]
    pub fn immediate(mut self) -> Self {
        self.retry_delay = Duration::ZERO;
        self
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err("Canvas dimensions must be greater than zero".to_string());
        }
        if self.attempts == 0 {
            return Err("Capture attempts must be at least 1".to_string());
        }
        if !self.fallback_device_pixel_ratio.is_finite() || self.fallback_device_pixel_ratio <= 0.0
        {
            return Err("Fallback device pixel ratio must be positive".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_defaults() {
        let options = SessionOptions::default();
        assert_eq!(options.attach_retries, 3);
        assert_eq!(options.command_retries, 2);
        assert_eq!(options.reattach_delay, Duration::from_millis(100));
        assert_eq!(options.reattach_fallback_delay, Duration::from_millis(500));
        assert_eq!(options.stats_log_interval, 50);
        assert_eq!(options.error_history, 10);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_session_immediate_keeps_budgets() {
        let options = SessionOptions::immediate();
        assert_eq!(options.attach_retries, 3);
        assert_eq!(options.backoff.delay(3), Duration::ZERO);
        assert_eq!(options.resubmit_delay, Duration::ZERO);
    }

    #[test]
    fn test_session_validation() {
        let options = SessionOptions::new().with_attach_retries(0);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_input_timing_defaults() {
        let timing = InputTiming::default();
        assert_eq!(timing.click_gap, Duration::from_millis(50));
        assert_eq!(timing.double_click_gap, Duration::from_millis(150));
        assert_eq!(timing.triple_click_gap, Duration::from_millis(100));
        assert_eq!(timing.drag_steps, 10);
        assert_eq!(timing.hold_initial_delay, Duration::from_millis(500));
        assert_eq!(timing.hold_repeat_interval, Duration::from_millis(40));
    }

    #[test]
    fn test_input_timing_immediate() {
        let timing = InputTiming::immediate();
        assert!(timing.click_gap.is_zero());
        assert!(timing.hold_initial_delay.is_zero());
        assert_eq!(timing.drag_steps, 10);
        assert_eq!(timing.scroll_delta, 100.0);
    }

    #[test]
    fn test_capture_validation() {
        assert!(CaptureOptions::default().validate().is_ok());
        assert!(
            CaptureOptions::default()
                .with_canvas(0, 768)
                .validate()
                .is_err()
        );
    }
}
