//! WebSocket transport layer.
//!
//! This module handles communication between local end (Rust) and the
//! browser's remote debugging endpoint via WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  CdpBackend     │                              │  Browser        │
//! │                 │         WebSocket            │                 │
//! │  Connection     │─────────────────────────────►│  DevTools       │
//! │  (event loop)   │◄─────────────────────────────│  endpoint       │
//! │                 │   responses (id) / events    │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `subscription` | Event fan-out with RAII unsubscription |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// Event subscriptions.
pub mod subscription;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::Connection;
pub use subscription::{EventStream, Subscribers};
