//! Agent configuration.
//!
//! [`AgentConfig`] aggregates every tunable of the crate and is built
//! through [`AgentConfigBuilder`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Exponential retry delays with jitter |
//! | `builder` | Validating fluent builder |
//! | `options` | Session, input timing and capture option groups |

// ============================================================================
// Submodules
// ============================================================================

/// Exponential backoff.
pub mod backoff;

/// Validating builder.
pub mod builder;

/// Option groups.
pub mod options;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::BackoffPolicy;
pub use builder::AgentConfigBuilder;
pub use options::{CaptureOptions, InputTiming, SessionOptions};

// ============================================================================
// Mode
// ============================================================================

/// How the agent applies the policy's actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Actions are dispatched to the tab.
    #[default]
    Autopilot,
    /// Actions are cued to the companion, which performs them and acknowledges.
    Copilot,
}

// ============================================================================
// AgentConfig
// ============================================================================

/// Complete, validated configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Remote debugging endpoint, if connecting over WebSocket.
    pub endpoint: Option<Url>,
    /// Execution mode.
    pub mode: Mode,
    /// Session retry behaviour.
    pub session: SessionOptions,
    /// Input synthesis timing.
    pub input: InputTiming,
    /// Screenshot capture settings.
    pub capture: CaptureOptions,
    /// Delay between a successful action and its follow-up screenshot.
    pub settle_delay: Duration,
    /// Companion acknowledgment timeout.
    pub cue_timeout: Duration,
}

impl AgentConfig {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::new()
    }
}
