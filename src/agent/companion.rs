//! Companion UI channel.
//!
//! The companion mirrors the run to the user: assistant text, action
//! titles, cues drawn on the page and error notices. In copilot mode the
//! user performs the cued action and the companion acknowledges it.
//!
//! | Message | Direction | Acknowledged |
//! |---------|-----------|--------------|
//! | `AI_RESPONSE` | agent → UI | no |
//! | `ACTION_RESPONSE` | agent → UI | no |
//! | `FINISH_RUN` | agent → UI | no |
//! | `ERROR_NOTICE` | agent → UI | no |
//! | `AUTOPILOT_CUE` | agent → UI | delivery only |
//! | `COPILOT_WAIT_RESPONSE` + `COPILOT_CUE` | agent → UI | yes, by cue id |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::CueId;

use super::action::ActionDescriptor;

// ============================================================================
// Constants
// ============================================================================

/// Notice shown when a run stops on an error.
pub const ERROR_NOTICE: &str = "Something went wrong. Please restart the session and try again.";

// ============================================================================
// CompanionMessage
// ============================================================================

/// Messages emitted to the companion UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanionMessage {
    /// Assistant text for the chat panel.
    #[serde(rename_all = "camelCase")]
    AiResponse {
        /// The text.
        ai_message: String,
    },
    /// Title of an executed action.
    ActionResponse {
        /// Human-readable title.
        title: String,
    },
    /// The run finished.
    FinishRun,
    /// The run stopped on an error.
    ErrorNotice {
        /// Notice text.
        message: String,
    },
    /// Visual cue for an action the agent is about to perform.
    #[serde(rename_all = "camelCase")]
    AutopilotCue {
        /// Cue id.
        cue_id: CueId,
        /// Verb.
        action_name: String,
        /// Parameters.
        payload: Value,
    },
    /// Copilot is waiting for the user.
    CopilotWaitResponse,
    /// Action the user should perform.
    #[serde(rename_all = "camelCase")]
    CopilotCue {
        /// Cue id to acknowledge.
        cue_id: CueId,
        /// Verb.
        action_name: String,
        /// Parameters.
        payload: Value,
    },
}

// ============================================================================
// Companion
// ============================================================================

/// Companion UI collaborator.
#[async_trait]
pub trait Companion: Send + Sync {
    /// Shows assistant text.
    fn send_text(&self, text: &str);

    /// Shows the title of an executed action.
    fn send_action_title(&self, title: &str);

    /// Signals the end of a run.
    fn finish_run(&self);

    /// Shows the generic error notice.
    fn error_notice(&self, message: &str);

    /// Sends an autopilot cue. Returns whether it was delivered.
    async fn autopilot_cue(&self, action: &ActionDescriptor) -> bool;

    /// Sends a copilot cue and waits for its acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CueTimeout`] if no acknowledgment arrives in time.
    async fn copilot_cue(&self, action: &ActionDescriptor, timeout: Duration) -> Result<()>;
}

// ============================================================================
// NoopCompanion
// ============================================================================

/// Companion that drops everything and acknowledges immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCompanion;

#[async_trait]
impl Companion for NoopCompanion {
    fn send_text(&self, _text: &str) {}

    fn send_action_title(&self, _title: &str) {}

    fn finish_run(&self) {}

    fn error_notice(&self, _message: &str) {}

    async fn autopilot_cue(&self, _action: &ActionDescriptor) -> bool {
        false
    }

    async fn copilot_cue(&self, _action: &ActionDescriptor, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// ChannelCompanion
// ============================================================================

/// Companion emitting [`CompanionMessage`]s on an mpsc channel.
///
/// Copilot acknowledgments come back through
/// [`ChannelCompanion::acknowledge`].
#[derive(Debug)]
pub struct ChannelCompanion {
    tx: mpsc::UnboundedSender<CompanionMessage>,
    pending: Mutex<FxHashMap<CueId, oneshot::Sender<()>>>,
}

impl ChannelCompanion {
    /// Creates the companion and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CompanionMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let companion = Self {
            tx,
            pending: Mutex::new(FxHashMap::default()),
        };
        (companion, rx)
    }

    /// Acknowledges a copilot cue. Returns `false` for unknown or expired cues.
    pub fn acknowledge(&self, cue_id: CueId) -> bool {
        let Some(tx) = self.pending.lock().remove(&cue_id) else {
            debug!(%cue_id, "Acknowledgment for unknown cue");
            return false;
        };
        tx.send(()).is_ok()
    }

    /// Number of cues awaiting acknowledgment.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn emit(&self, message: CompanionMessage) -> bool {
        if self.tx.send(message).is_err() {
            debug!("Companion channel closed");
            return false;
        }
        true
    }
}

#[async_trait]
impl Companion for ChannelCompanion {
    fn send_text(&self, text: &str) {
        self.emit(CompanionMessage::AiResponse {
            ai_message: text.to_string(),
        });
    }

    fn send_action_title(&self, title: &str) {
        self.emit(CompanionMessage::ActionResponse {
            title: title.to_string(),
        });
    }

    fn finish_run(&self) {
        self.emit(CompanionMessage::FinishRun);
    }

    fn error_notice(&self, message: &str) {
        self.emit(CompanionMessage::ErrorNotice {
            message: message.to_string(),
        });
    }

    async fn autopilot_cue(&self, action: &ActionDescriptor) -> bool {
        self.emit(CompanionMessage::AutopilotCue {
            cue_id: CueId::generate(),
            action_name: action.name().to_string(),
            payload: action.payload(),
        })
    }

    async fn copilot_cue(&self, action: &ActionDescriptor, timeout: Duration) -> Result<()> {
        let cue_id = CueId::generate();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(cue_id, tx);

        self.emit(CompanionMessage::CopilotWaitResponse);
        self.emit(CompanionMessage::CopilotCue {
            cue_id,
            action_name: action.name().to_string(),
            payload: action.payload(),
        });

        match tokio::time::timeout(timeout, rx).await {
            Ok(ack) => {
                ack?;
                debug!(%cue_id, action = %action.name(), "Copilot cue acknowledged");
                Ok(())
            }
            Err(_) => {
                self.pending.lock().remove(&cue_id);
                warn!(%cue_id, action = %action.name(), "Copilot cue timed out");
                Err(Error::cue_timeout(
                    action.name().as_str(),
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                ))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use serde_json::json;

    fn action() -> ActionDescriptor {
        ActionDescriptor::from_tool_input(&json!({"action": "left_click", "coordinate": [1, 2]}))
            .expect("valid action")
    }

    #[test]
    fn test_message_wire_shape() {
        let value = serde_json::to_value(CompanionMessage::AiResponse {
            ai_message: "hi".to_string(),
        })
        .expect("serialize");
        assert_eq!(value, json!({"type": "AI_RESPONSE", "aiMessage": "hi"}));

        let value = serde_json::to_value(CompanionMessage::FinishRun).expect("serialize");
        assert_eq!(value, json!({"type": "FINISH_RUN"}));
    }

    #[tokio::test]
    async fn test_autopilot_cue_reports_delivery() {
        let (companion, mut rx) = ChannelCompanion::new();
        assert!(companion.autopilot_cue(&action()).await);

        let Some(CompanionMessage::AutopilotCue {
            action_name,
            payload,
            ..
        }) = rx.recv().await
        else {
            panic!("expected autopilot cue");
        };
        assert_eq!(action_name, "left_click");
        assert_eq!(payload["coordinate"], json!([1.0, 2.0]));

        drop(rx);
        assert!(!companion.autopilot_cue(&action()).await);
    }

    #[tokio::test]
    async fn test_copilot_cue_waits_for_ack() {
        let (companion, mut rx) = ChannelCompanion::new();
        let companion = Arc::new(companion);

        let acker = {
            let companion = Arc::clone(&companion);
            tokio::spawn(async move {
                while let Some(message) = rx.recv().await {
                    if let CompanionMessage::CopilotCue { cue_id, .. } = message {
                        assert!(companion.acknowledge(cue_id));
                        break;
                    }
                }
            })
        };

        companion
            .copilot_cue(&action(), Duration::from_secs(60))
            .await
            .expect("acknowledged");
        acker.await.expect("acker");
        assert_eq!(companion.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_copilot_cue_times_out() {
        let (companion, _rx) = ChannelCompanion::new();

        let err = companion
            .copilot_cue(&action(), Duration::from_secs(60))
            .await
            .expect_err("no ack");

        assert!(matches!(err, Error::CueTimeout { timeout_ms: 60_000, .. }));
        assert_eq!(companion.pending_count(), 0);
    }

    #[test]
    fn test_unknown_ack_is_rejected() {
        let (companion, _rx) = ChannelCompanion::new();
        assert!(!companion.acknowledge(CueId::generate()));
    }

    #[tokio::test]
    async fn test_noop_companion() {
        let companion = NoopCompanion;
        companion.send_text("ignored");
        assert!(!companion.autopilot_cue(&action()).await);
        companion
            .copilot_cue(&action(), Duration::ZERO)
            .await
            .expect("immediate ack");
    }
}
