//! Policy provider seam.
//!
//! The provider turns the trajectory into the next assistant content
//! blocks. A step without a `tool_use` block ends the run.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::Mode;
use crate::error::{Error, Result};

use super::trajectory::{ContentBlock, Message};

// ============================================================================
// PolicyProvider
// ============================================================================

/// Produces the next step for a trajectory.
#[async_trait]
pub trait PolicyProvider: Send + Sync {
    /// Returns the assistant content blocks for the next step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Policy`] if no step can be produced.
    async fn next_step(&self, trajectory: &[Message], mode: Mode) -> Result<Vec<ContentBlock>>;
}

// ============================================================================
// ScriptedPolicy
// ============================================================================

/// Replays a fixed list of steps, then fails.
///
/// Useful for demos and tests.
#[derive(Debug, Default)]
pub struct ScriptedPolicy {
    steps: Mutex<VecDeque<Result<Vec<ContentBlock>>>>,
    seen: Mutex<Vec<usize>>,
}

impl ScriptedPolicy {
    /// Creates a policy returning `steps` in order.
    #[must_use]
    pub fn new(steps: impl IntoIterator<Item = Vec<ContentBlock>>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().map(Ok).collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Queues a failing step.
    pub fn push_error(&self, message: impl Into<String>) {
        self.steps.lock().push_back(Err(Error::policy(message)));
    }

    /// Trajectory lengths observed at each call.
    #[must_use]
    pub fn observed_lengths(&self) -> Vec<usize> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl PolicyProvider for ScriptedPolicy {
    async fn next_step(&self, trajectory: &[Message], _mode: Mode) -> Result<Vec<ContentBlock>> {
        self.seen.lock().push(trajectory.len());
        self.steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::policy("Script exhausted")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_steps_in_order() {
        let policy = ScriptedPolicy::new([
            vec![ContentBlock::text("one")],
            vec![ContentBlock::text("two")],
        ]);

        let first = policy.next_step(&[], Mode::Autopilot).await.expect("step");
        assert_eq!(first, vec![ContentBlock::text("one")]);
        let second = policy.next_step(&[Message::user_text("x")], Mode::Autopilot).await.expect("step");
        assert_eq!(second, vec![ContentBlock::text("two")]);

        let err = policy.next_step(&[], Mode::Autopilot).await.expect_err("exhausted");
        assert!(matches!(err, Error::Policy { .. }));
        assert_eq!(policy.observed_lengths(), [0, 1, 0]);
    }
}
