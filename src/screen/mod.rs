//! Screenshots and coordinate mapping.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `capture` | [`ScreenCapturer`] and the [`normalize`] pipeline |
//! | `frame` | [`CoordinateFrame`] geometry and the shared [`CoordinateMapper`] |

// ============================================================================
// Submodules
// ============================================================================

/// Screenshot capture.
pub mod capture;

/// Capture frame geometry.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use capture::{ScreenCapturer, Screenshot, normalize};
pub use frame::{CoordinateFrame, CoordinateMapper, Point};
