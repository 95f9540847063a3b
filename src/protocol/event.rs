//! Event message types.
//!
//! Events are notifications sent from the remote end when browser
//! activity occurs. Session-scoped events carry the `sessionId` of the
//! attached target they belong to.
//!
//! # Event Types
//!
//! | Domain | Events |
//! |--------|--------|
//! | `Page` | `frameStartedLoading`, `loadEventFired` |
//! | `Target` | `targetInfoChanged`, `detachedFromTarget`, `targetDestroyed` |
//! | `Inspector` | `detached` |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Event
// ============================================================================

/// An event notification from remote end to local end.
///
/// # Format
///
/// ```json
/// {
///   "method": "Domain.eventName",
///   "params": { ... },
///   "sessionId": "8F2A..."
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,

    /// Session that emitted the event (absent for browser-level events).
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

impl Event {
    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        match self.method.as_str() {
            "Page.frameStartedLoading" => ParsedEvent::PageFrameStartedLoading {
                frame_id: self.get_string("frameId"),
            },

            "Page.loadEventFired" => ParsedEvent::PageLoadEventFired,

            "Target.targetInfoChanged" => {
                let info = self.params.get("targetInfo");
                let field = |key: &str| {
                    info.and_then(|v| v.get(key))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                ParsedEvent::TargetInfoChanged {
                    target_id: field("targetId"),
                    url: field("url"),
                    kind: field("type"),
                    attached: info
                        .and_then(|v| v.get("attached"))
                        .and_then(Value::as_bool)
                        .unwrap_or_default(),
                }
            }

            "Target.detachedFromTarget" => ParsedEvent::TargetDetachedFromTarget {
                session_id: self.get_string("sessionId"),
                target_id: self.get_optional_string("targetId"),
            },

            "Target.targetDestroyed" => ParsedEvent::TargetDestroyed {
                target_id: self.get_string("targetId"),
            },

            "Inspector.detached" => ParsedEvent::InspectorDetached {
                reason: self.get_string("reason"),
            },

            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        }
    }

    /// Gets a string from params.
    #[inline]
    fn get_string(&self, key: &str) -> String {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Gets an optional string from params.
    #[inline]
    fn get_optional_string(&self, key: &str) -> Option<String> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// A frame started loading. The main frame id equals the target id.
    PageFrameStartedLoading {
        /// Frame ID.
        frame_id: String,
    },

    /// Page `load` event fired.
    PageLoadEventFired,

    /// Target metadata changed (navigation, title, attachment).
    TargetInfoChanged {
        /// Target ID.
        target_id: String,
        /// Current URL.
        url: String,
        /// Target type (`page`, `iframe`, ...).
        kind: String,
        /// Whether a debugger is attached.
        attached: bool,
    },

    /// A flattened session was detached.
    TargetDetachedFromTarget {
        /// Detached session.
        session_id: String,
        /// Target the session belonged to.
        target_id: Option<String>,
    },

    /// Target closed.
    TargetDestroyed {
        /// Target ID.
        target_id: String,
    },

    /// Debugger detached from the inspected target.
    InspectorDetached {
        /// Detach reason (e.g. `target_closed`).
        reason: String,
    },

    /// Unknown event type.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================
