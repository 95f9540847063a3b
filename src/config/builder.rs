//! Builder pattern for agent configuration.
//!
//! Provides a fluent API for configuring and validating [`AgentConfig`].
//!
//! # Example
//!
//! ```no_run
//! use tab_autopilot::{AgentConfig, Mode};
//!
//! # fn example() -> tab_autopilot::Result<()> {
//! let config = AgentConfig::builder()
//!     .endpoint("ws://127.0.0.1:9222/devtools/browser/abc")
//!     .mode(Mode::Autopilot)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

use super::{AgentConfig, CaptureOptions, InputTiming, Mode, SessionOptions};

// ============================================================================
// Constants
// ============================================================================

/// Delay between a successful action and its follow-up screenshot.
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1100);

/// Companion acknowledgment timeout.
const DEFAULT_CUE_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// AgentConfigBuilder
// ============================================================================

/// Builder for [`AgentConfig`].
///
/// Use [`AgentConfig::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct AgentConfigBuilder {
    endpoint: Option<String>,
    mode: Option<Mode>,
    session: Option<SessionOptions>,
    input: Option<InputTiming>,
    capture: Option<CaptureOptions>,
    settle_delay: Option<Duration>,
    cue_timeout: Option<Duration>,
}

// ============================================================================
// AgentConfigBuilder Implementation
// ============================================================================

impl AgentConfigBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the remote debugging WebSocket endpoint.
    ///
    /// # Arguments
    ///
    /// * `url` - `ws://` or `wss://` URL of the browser's debugging endpoint
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Sets the execution mode.
    #[inline]
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets session retry options.
    #[inline]
    #[must_use]
    pub fn session(mut self, options: SessionOptions) -> Self {
        self.session = Some(options);
        self
    }

    /// Sets input synthesis timing.
    #[inline]
    #[must_use]
    pub fn input_timing(mut self, timing: InputTiming) -> Self {
        self.input = Some(timing);
        self
    }

    /// Sets screenshot capture options.
    #[inline]
    #[must_use]
    pub fn capture(mut self, options: CaptureOptions) -> Self {
        self.capture = Some(options);
        self
    }

    /// Sets the delay between an action and its follow-up screenshot.
    #[inline]
    #[must_use]
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = Some(delay);
        self
    }

    /// Sets the companion acknowledgment timeout.
    #[inline]
    #[must_use]
    pub fn cue_timeout(mut self, timeout: Duration) -> Self {
        self.cue_timeout = Some(timeout);
        self
    }

    /// Zeroes every artificial delay. Intended for tests and benches.
    #[must_use]
    pub fn immediate(self) -> Self {
        self.session(SessionOptions::immediate())
            .input_timing(InputTiming::immediate())
            .capture(CaptureOptions::default().immediate())
            .settle_delay(Duration::ZERO)
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the endpoint is not a `ws`/`wss` URL
    /// - [`Error::Config`] if any option group is invalid
    /// - [`Error::Config`] if the cue timeout is zero
    pub fn build(self) -> Result<AgentConfig> {
        let endpoint = self.validate_endpoint()?;
        let session = self.session.unwrap_or_default();
        let input = self.input.unwrap_or_default();
        let capture = self.capture.unwrap_or_default();

        session
            .validate()
            .map_err(|e| Error::config(format!("Invalid session options: {e}")))?;
        input
            .validate()
            .map_err(|e| Error::config(format!("Invalid input timing: {e}")))?;
        capture
            .validate()
            .map_err(|e| Error::config(format!("Invalid capture options: {e}")))?;

        let cue_timeout = self.cue_timeout.unwrap_or(DEFAULT_CUE_TIMEOUT);
        if cue_timeout.is_zero() {
            return Err(Error::config("Cue timeout must be greater than zero"));
        }

        Ok(AgentConfig {
            endpoint,
            mode: self.mode.unwrap_or_default(),
            session,
            input,
            capture,
            settle_delay: self.settle_delay.unwrap_or(DEFAULT_SETTLE_DELAY),
            cue_timeout,
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

impl AgentConfigBuilder {
    /// Validates the endpoint configuration.
    fn validate_endpoint(&self) -> Result<Option<Url>> {
        let Some(raw) = self.endpoint.as_deref() else {
            return Ok(None);
        };

        let url = Url::parse(raw).map_err(|e| {
            Error::config(format!(
                "Invalid debugging endpoint '{raw}': {e}\n\
                 Example: AgentConfig::builder().endpoint(\"ws://127.0.0.1:9222/devtools/browser/<id>\")"
            ))
        })?;

        match url.scheme() {
            "ws" | "wss" => Ok(Some(url)),
            scheme => Err(Error::config(format!(
                "Debugging endpoint must use ws:// or wss://, got '{scheme}://'"
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
