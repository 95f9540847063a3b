//! Protocol session management.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backend` | [`DebuggerBackend`] seam and the DevTools [`CdpBackend`] |
//! | `core` | [`ProtocolSession`]: attach/detach/reattach, retries, readiness |
//! | `events` | Tab lifecycle notifications |
//! | `stats` | Per-method command statistics |
//! | `target` | The controlled tab |

// ============================================================================
// Submodules
// ============================================================================

/// Backend abstraction and DevTools implementation.
pub mod backend;

/// Session state machine and command path.
pub mod core;

/// Lifecycle events.
pub mod events;

/// Command statistics.
pub mod stats;

/// Controlled tab.
pub mod target;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use backend::{CdpBackend, DebuggerBackend, TargetInfo};
pub use core::{ProtocolSession, SessionPhase};
pub use events::{DetachReason, LifecycleEvent, LoadStatus};
pub use stats::{MethodStats, SessionStats};
pub use target::{Target, is_unsupported_url};
