//! Remote debugging protocol message types.
//!
//! This module defines the message format for communication between
//! local end (Rust) and the browser's remote debugging endpoint.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Remote | Command request |
//! | `Response` | Remote → Local | Command response |
//! | `Event` | Remote → Local | Browser notification |
//!
//! # Command Naming
//!
//! Commands follow `Domain.methodName` format:
//!
//! - `Input.dispatchMouseEvent`
//! - `Target.attachToTarget`
//! - `Runtime.evaluate`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions by domain |
//! | `event` | Event types |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by domain.
pub mod command;

/// Event message types.
pub mod event;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    Command, InputCommand, KeyEvent, KeyEventType, MouseButton, MouseEvent, MouseEventType,
    PageCommand, RuntimeCommand, TargetCommand,
};
pub use event::{Event, ParsedEvent};
pub use request::{RemoteError, Request, Response};
