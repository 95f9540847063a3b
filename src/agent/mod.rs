//! Policy-driven agent.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `action` | [`ActionDescriptor`] parsing, titles, coordinate conversion |
//! | `companion` | [`Companion`] UI channel and cues |
//! | `executor` | [`ActionExecutor`]: autopilot and copilot execution |
//! | `policy` | [`PolicyProvider`] seam |
//! | `result` | [`ActionResult`] observations |
//! | `runner` | [`Agent`] loop |
//! | `trajectory` | [`Trajectory`] in the provider's wire shape |

// ============================================================================
// Submodules
// ============================================================================

/// Action descriptors.
pub mod action;

/// Companion UI channel.
pub mod companion;

/// Action execution.
pub mod executor;

/// Policy provider seam.
pub mod policy;

/// Action results.
pub mod result;

/// Agent loop.
pub mod runner;

/// Conversation history.
pub mod trajectory;

// ============================================================================
// Re-exports
// ============================================================================

pub use action::{ActionDescriptor, ActionName, ActionParams};
pub use companion::{ChannelCompanion, Companion, CompanionMessage, ERROR_NOTICE, NoopCompanion};
pub use executor::ActionExecutor;
pub use policy::{PolicyProvider, ScriptedPolicy};
pub use result::ActionResult;
pub use runner::{Agent, RunOutcome};
pub use trajectory::{
    COMPUTER_TOOL, ContentBlock, ImageSource, Message, Role, ToolResultContent, Trajectory,
};
