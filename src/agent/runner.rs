//! Policy loop.
//!
//! One run alternates policy steps and action executions until the policy
//! answers without a `computer` tool invocation:
//!
//! ```text
//! user text ─► policy ─► text blocks ─► companion
//!                 ▲         │
//!                 │         └─ tool_use ─► executor ─► tool_result
//!                 └──────────────────────────────────────┘
//! ```
//!
//! Validation failures (bad tool input, coordinates before the first
//! screenshot) are returned to the policy as error tool results. Any other
//! failure prunes the unanswered step, shows the error notice and ends the
//! run with the error.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Mode;
use crate::error::{Error, Result};

use super::action::ActionDescriptor;
use super::companion::ERROR_NOTICE;
use super::executor::ActionExecutor;
use super::policy::PolicyProvider;
use super::trajectory::{COMPUTER_TOOL, ContentBlock, Message, Role, ToolResultContent, Trajectory};

// ============================================================================
// RunOutcome
// ============================================================================

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The policy answered without requesting an action.
    Finished,
    /// The run was cancelled.
    Cancelled,
}

// ============================================================================
// Agent
// ============================================================================

/// Drives a [`PolicyProvider`] against an [`ActionExecutor`].
pub struct Agent {
    policy: Arc<dyn PolicyProvider>,
    executor: ActionExecutor,
    trajectory: Mutex<Trajectory>,
}

impl Agent {
    /// Creates an agent with an empty trajectory.
    #[must_use]
    pub fn new(policy: Arc<dyn PolicyProvider>, executor: ActionExecutor) -> Self {
        Self {
            policy,
            executor,
            trajectory: Mutex::new(Trajectory::new()),
        }
    }

    /// Returns the executor.
    #[inline]
    #[must_use]
    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Snapshot of the trajectory.
    #[must_use]
    pub fn trajectory(&self) -> Vec<Message> {
        self.trajectory.lock().messages().to_vec()
    }

    /// Switches execution mode.
    pub fn set_mode(&self, mode: Mode) {
        self.executor.set_mode(mode);
    }

    /// Clears the trajectory.
    pub fn reset(&self) {
        info!("Resetting trajectory");
        self.trajectory.lock().reset();
    }

    /// Cancels the run observing `token` and prunes any unanswered action.
    pub fn stop(&self, token: &CancellationToken) {
        info!("Stopping run");
        token.cancel();
        self.trajectory.lock().cleanup_last_action();
    }

    /// Runs the policy loop for one user instruction.
    ///
    /// Cancellation is checked before each policy step and before and
    /// after each action; an in-flight action is allowed to finish, but its
    /// result is dropped rather than recorded.
    ///
    /// # Errors
    ///
    /// Returns the policy or executor error that ended the run. The error
    /// notice has already been sent to the companion.
    pub async fn run(&self, text: &str, token: &CancellationToken) -> Result<RunOutcome> {
        self.append(Message::user_text(text));
        info!(chars = text.len(), "Run started");

        let mut step = 0usize;
        loop {
            if token.is_cancelled() {
                return Ok(self.cancelled());
            }
            step += 1;

            let messages = self.trajectory();
            let mode = self.executor.mode();
            let blocks = tokio::select! {
                biased;
                () = token.cancelled() => return Ok(self.cancelled()),
                blocks = self.policy.next_step(&messages, mode) => blocks,
            };
            let blocks = match blocks {
                Ok(blocks) => blocks,
                Err(e) => return Err(self.halt(e)),
            };

            for block in &blocks {
                if let ContentBlock::Text { text } = block {
                    self.executor.companion().send_text(text);
                }
            }

            let calls = tool_calls(&blocks);
            self.append(Message::assistant(blocks));

            if calls.is_empty() {
                info!(steps = step, "Run finished");
                self.executor.companion().finish_run();
                return Ok(RunOutcome::Finished);
            }

            let mut results = Vec::with_capacity(calls.len());
            for (id, name, input) in calls {
                if token.is_cancelled() {
                    return Ok(self.cancelled());
                }
                match self.invoke(&name, &input).await {
                    Ok(content) => results.push(tool_result(id, content, false)),
                    Err(e) if e.is_validation() => {
                        warn!(step, error = %e, "Rejected tool input");
                        results.push(tool_result(id, ToolResultContent::Text(e.to_string()), true));
                    }
                    Err(e) => return Err(self.halt(e)),
                }
                // A stop during the action already pruned its tool_use
                if token.is_cancelled() {
                    return Ok(self.cancelled());
                }
            }

            self.append(Message {
                role: Role::User,
                content: results,
            });
        }
    }

    async fn invoke(&self, name: &str, input: &Value) -> Result<ToolResultContent> {
        if name != COMPUTER_TOOL {
            return Err(Error::invalid_action(format!("Unknown tool: {name}")));
        }
        let action = ActionDescriptor::from_tool_input(input)?;
        let result = self.executor.execute(&action).await?;
        Ok(result.into_content())
    }

    fn append(&self, message: Message) {
        self.trajectory.lock().append(message);
    }

    fn cancelled(&self) -> RunOutcome {
        info!("Run cancelled");
        self.trajectory.lock().cleanup_last_action();
        RunOutcome::Cancelled
    }

    fn halt(&self, e: Error) -> Error {
        error!(error = %e, "Run halted");
        self.trajectory.lock().cleanup_last_action();
        self.executor.companion().error_notice(ERROR_NOTICE);
        e
    }
}

/// Tool invocations in a policy step, as `(id, name, input)`.
fn tool_calls(blocks: &[ContentBlock]) -> Vec<(String, String, Value)> {
    let calls: Vec<_> = blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => {
                Some((id.clone(), name.clone(), input.clone()))
            }
            _ => None,
        })
        .collect();
    debug!(count = calls.len(), "Tool calls in step");
    calls
}

fn tool_result(tool_use_id: String, content: ToolResultContent, is_error: bool) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id,
        content,
        is_error,
    }
}

// ============================================================================
// Tests
// ============================================================================
