//! Tab and target lifecycle notifications.

// ============================================================================
// Imports
// ============================================================================

use crate::identifiers::TargetId;

// ============================================================================
// LoadStatus
// ============================================================================

/// Page load progress reported by a tab update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Navigation started.
    Loading,
    /// Page finished loading.
    Complete,
}

// ============================================================================
// DetachReason
// ============================================================================

/// Why the debugger lost a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetachReason {
    /// The target itself went away.
    TargetClosed,
    /// Any other reason (user cancelled, replaced by another client, ...).
    Other(String),
}

impl DetachReason {
    /// Parses a reason string from the remote end.
    #[must_use]
    pub fn from_remote(reason: &str) -> Self {
        match reason {
            "target_closed" => Self::TargetClosed,
            other => Self::Other(other.to_string()),
        }
    }
}

// ============================================================================
// LifecycleEvent
// ============================================================================

/// Lifecycle event consumed by the protocol session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Tab navigated or changed URL.
    TabUpdated {
        /// Tab.
        target: TargetId,
        /// Load progress, if this update reports one.
        status: Option<LoadStatus>,
        /// New URL, if it changed.
        url: Option<String>,
    },

    /// A different tab became the foreground tab.
    TabActivated {
        /// Newly active tab.
        target: TargetId,
    },

    /// The debugger was detached from a tab.
    TargetDetached {
        /// Tab.
        target: TargetId,
        /// Detach reason.
        reason: DetachReason,
    },

    /// Tab closed.
    TabClosed {
        /// Tab.
        target: TargetId,
    },
}

impl LifecycleEvent {
    /// Returns the tab the event refers to.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &TargetId {
        match self {
            Self::TabUpdated { target, .. }
            | Self::TabActivated { target }
            | Self::TargetDetached { target, .. }
            | Self::TabClosed { target } => target,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detach_reason_parsing() {
        assert_eq!(
            DetachReason::from_remote("target_closed"),
            DetachReason::TargetClosed
        );
        assert_eq!(
            DetachReason::from_remote("canceled_by_user"),
            DetachReason::Other("canceled_by_user".to_string())
        );
    }

    #[test]
    fn test_event_target() {
        let target = TargetId::new("T9").expect("valid target id");
        let event = LifecycleEvent::TabClosed {
            target: target.clone(),
        };
        assert_eq!(event.target(), &target);
    }
}
