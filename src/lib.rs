//! Tab Autopilot - drive a browser tab for an AI policy loop.
//!
//! This library attaches to a browser tab over the remote debugging
//! protocol, keeps that attachment alive, and executes the actions a
//! policy requests: clicks, drags, scrolls, typing, key presses and
//! screenshots.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   tool_use    ┌──────────────┐   input events   ┌─────────────────┐
//! │  Policy  │──────────────►│   Executor   │─────────────────►│ ProtocolSession │
//! │          │◄──────────────│              │◄─────────────────│  (retries,      │
//! └──────────┘  screenshots  └──────────────┘   screenshots    │   reattach)     │
//!                                   │                          └────────┬────────┘
//!                                   ▼ cues, titles                      │ WebSocket
//!                             ┌───────────┐                    ┌────────▼────────┐
//!                             │ Companion │                    │ DevTools target │
//!                             └───────────┘                    └─────────────────┘
//! ```
//!
//! Key design principles:
//!
//! - One [`ProtocolSession`] owns the attachment and transparently
//!   reattaches after navigations, crashes and tab switches
//! - Input actions are serialized through a FIFO [`ActionQueue`]
//! - Screenshots are letterboxed to a fixed canvas; canvas coordinates are
//!   mapped back to native pixels with the latest frame
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tab_autopilot::{
//!     ActionExecutor, Agent, AgentConfig, CdpBackend, NoopCompanion, ProtocolSession, Result,
//!     ScriptedPolicy,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AgentConfig::builder()
//!         .endpoint("ws://127.0.0.1:9222/devtools/browser/abc")
//!         .build()?;
//!
//!     let endpoint = config.endpoint.clone().expect("endpoint set above");
//!     let backend = Arc::new(CdpBackend::connect(&endpoint).await?);
//!     let session = Arc::new(ProtocolSession::new(backend, config.session.clone()));
//!     let _events = session.start();
//!
//!     let executor = ActionExecutor::new(session, Arc::new(NoopCompanion), &config);
//!     let agent = Agent::new(Arc::new(ScriptedPolicy::new([])), executor);
//!
//!     agent.run("Open the settings page", &CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | Policy loop, executor, companion, trajectory |
//! | [`config`] | Configuration and builder |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`input`] | Input translation, key combos, action queue |
//! | [`protocol`] | Remote debugging message types |
//! | [`screen`] | Screenshot normalization and coordinate mapping |
//! | [`session`] | Backend seam and resilient session |
//! | [`transport`] | WebSocket transport layer (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Policy-driven agent.
///
/// - [`Agent`] - The policy loop
/// - [`ActionExecutor`] - Executes one action
/// - [`Companion`] - UI channel
pub mod agent;

/// Configuration.
///
/// Use [`AgentConfig::builder()`] to create a validated configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Input synthesis.
pub mod input;

/// Remote debugging protocol message types.
pub mod protocol;

/// Screenshot pipeline.
pub mod screen;

/// Session management.
pub mod session;

/// WebSocket transport layer.
///
/// Internal module handling the DevTools WebSocket connection.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Agent types
pub use agent::{
    ActionDescriptor, ActionExecutor, ActionName, ActionResult, Agent, ChannelCompanion,
    Companion, CompanionMessage, ContentBlock, Message, NoopCompanion, PolicyProvider,
    RunOutcome, ScriptedPolicy, Trajectory,
};

// Configuration types
pub use config::{AgentConfig, AgentConfigBuilder, CaptureOptions, InputTiming, Mode, SessionOptions};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CueId, RequestId, SubscriptionId, TargetId};

// Input types
pub use input::{ActionQueue, InputAction, InputTranslator, KeyCombo, KeyDescriptor};

// Screen types
pub use screen::{CoordinateFrame, CoordinateMapper, Point, ScreenCapturer, Screenshot};

// Session types
pub use session::{CdpBackend, DebuggerBackend, LifecycleEvent, ProtocolSession, SessionStats, Target};
