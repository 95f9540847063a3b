//! Error types for tab-autopilot.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use tab_autopilot::{Error, Result};
//!
//! async fn probe(session: &ProtocolSession) -> Result<()> {
//!     session.execute(RuntimeCommand::liveness_probe().into()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`], [`Error::Remote`], [`Error::RequestTimeout`] |
//! | Session | [`Error::NotAttached`], [`Error::AttachFailed`], [`Error::NoTabsFound`], [`Error::SessionClosed`], [`Error::CommandFailed`] |
//! | Action | [`Error::InvalidAction`], [`Error::NoCaptureFrame`], [`Error::Screenshot`] |
//! | Collaborators | [`Error::CueTimeout`], [`Error::Policy`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Image`], [`Error::Base64`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use base64::DecodeError;
use image::ImageError;
use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{RequestId, TargetId};

// ============================================================================
// Constants
// ============================================================================

/// Lowercase fragments of remote error messages that mean the session is gone.
const DETACHMENT_MARKERS: &[&str] = &[
    "detached",
    "not attached",
    "no session with given id",
    "session with given id not found",
    "cannot find context",
    "execution context was destroyed",
    "target closed",
    "inspected target navigated or closed",
];

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when agent or session configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection attempt timed out.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// WebSocket connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected response shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Error reported by the remote end for a command.
    #[error("Remote error {code}: {message}")]
    Remote {
        /// Remote error code.
        code: i64,
        /// Remote error message.
        message: String,
    },

    /// Command request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// No live protocol session exists for the target.
    #[error("Debugger is not attached to target {target_id}")]
    NotAttached {
        /// Target the command was addressed to.
        target_id: TargetId,
    },

    /// Attaching to a target failed after every retry.
    #[error("Failed to attach to target {target_id} after {attempts} attempt(s)")]
    AttachFailed {
        /// Target that could not be attached.
        target_id: TargetId,
        /// Number of attach attempts made.
        attempts: u32,
    },

    /// No tab is available to attach to.
    ///
    /// Non-retryable: surfaces immediately.
    #[error("No tabs found")]
    NoTabsFound,

    /// The session was cleaned up and accepts no further commands.
    #[error("Session closed")]
    SessionClosed,

    /// A command failed after exhausting its retry budget.
    #[error("Command {method} failed after {attempts} attempt(s): {message}")]
    CommandFailed {
        /// Protocol method.
        method: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last error message.
        message: String,
    },

    // ========================================================================
    // Action Errors
    // ========================================================================
    /// Action request is malformed.
    ///
    /// Local validation failure: no remote call was attempted.
    #[error("Invalid action: {message}")]
    InvalidAction {
        /// Description of the validation failure.
        message: String,
    },

    /// Coordinates were mapped before any screenshot established a frame.
    #[error("No screenshot has been processed yet")]
    NoCaptureFrame,

    /// Screenshot capture or processing failed.
    #[error("Screenshot error: {message}")]
    Screenshot {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    /// Companion acknowledgment did not arrive in time.
    #[error("Cue for {action} timed out after {timeout_ms}ms")]
    CueTimeout {
        /// Action the cue was sent for.
        action: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Policy provider failed to produce a step.
    #[error("Policy error: {message}")]
    Policy {
        /// Description of the policy failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Image decoding or encoding error.
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// Base64 decoding error.
    #[error("Base64 error: {0}")]
    Base64(#[from] DecodeError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a remote error.
    #[inline]
    pub fn remote(code: i64, message: impl Into<String>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a not-attached error.
    #[inline]
    pub fn not_attached(target_id: TargetId) -> Self {
        Self::NotAttached { target_id }
    }

    /// Creates an attach-failed error.
    #[inline]
    pub fn attach_failed(target_id: TargetId, attempts: u32) -> Self {
        Self::AttachFailed {
            target_id,
            attempts,
        }
    }

    /// Creates a command-failed error.
    #[inline]
    pub fn command_failed(method: impl Into<String>, attempts: u32, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            method: method.into(),
            attempts,
            message: message.into(),
        }
    }

    /// Creates an invalid action error.
    #[inline]
    pub fn invalid_action(message: impl Into<String>) -> Self {
        Self::InvalidAction {
            message: message.into(),
        }
    }

    /// Creates a screenshot error.
    #[inline]
    pub fn screenshot(message: impl Into<String>) -> Self {
        Self::Screenshot {
            message: message.into(),
        }
    }

    /// Creates a cue timeout error.
    #[inline]
    pub fn cue_timeout(action: impl Into<String>, timeout_ms: u64) -> Self {
        Self::CueTimeout {
            action: action.into(),
            timeout_ms,
        }
    }

    /// Creates a policy error.
    #[inline]
    pub fn policy(message: impl Into<String>) -> Self {
        Self::Policy {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the error means the protocol session is gone.
    ///
    /// Detachment-like errors trigger a reattach-and-resubmit cycle.
    #[must_use]
    pub fn is_detachment(&self) -> bool {
        match self {
            Self::NotAttached { .. } => true,
            Self::Remote { message, .. } | Self::Protocol { message } => {
                let lowered = message.to_lowercase();
                DETACHMENT_MARKERS
                    .iter()
                    .any(|marker| lowered.contains(marker))
            }
            _ => false,
        }
    }

    /// Returns `true` if no valid tab exists.
    #[inline]
    #[must_use]
    pub fn is_target_loss(&self) -> bool {
        matches!(self, Self::NoTabsFound)
    }

    /// Returns `true` for local validation failures raised before any
    /// protocol call.
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidAction { .. } | Self::NoCaptureFrame)
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. } | Self::CueTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error may succeed on retry.
    ///
    /// Target loss, closed sessions and local validation failures never do.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::NoTabsFound
                | Self::SessionClosed
                | Self::Config { .. }
                | Self::InvalidAction { .. }
                | Self::NoCaptureFrame
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
