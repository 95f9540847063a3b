//! Input synthesis.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `keyboard` | Key table and combo parsing |
//! | `queue` | FIFO serialization of input operations |
//! | `translator` | Action verbs to protocol input events |

// ============================================================================
// Submodules
// ============================================================================

/// Key definitions and combo parsing.
pub mod keyboard;

/// Action queue.
pub mod queue;

/// Input translator.
pub mod translator;

// ============================================================================
// Re-exports
// ============================================================================

pub use keyboard::{Key, KeyCombo, KeyDescriptor, Modifier};
pub use queue::ActionQueue;
pub use translator::{
    ActionOutcome, CURSOR_POSITION_ADVICE, ClickKind, InputAction, InputTranslator,
    MOUSE_BUTTON_ADVICE, ScrollDirection,
};
