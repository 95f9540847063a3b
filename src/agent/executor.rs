//! Action execution against the controlled tab.
//!
//! | Mode | Non-screenshot verbs |
//! |------|----------------------|
//! | Autopilot | readiness check, cue, dispatch, title, settle, screenshot |
//! | Copilot | cue, wait for acknowledgment, settle, screenshot |
//!
//! `screenshot` always captures directly. Coordinates in tool input are
//! canvas points and are mapped to native pixels before anything else.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::{AgentConfig, Mode};
use crate::error::Result;
use crate::input::InputTranslator;
use crate::screen::{CoordinateMapper, ScreenCapturer};
use crate::session::ProtocolSession;

use super::action::{ActionDescriptor, ActionName};
use super::companion::Companion;
use super::result::ActionResult;

// ============================================================================
// ActionExecutor
// ============================================================================

/// Executes [`ActionDescriptor`]s and produces observations.
pub struct ActionExecutor {
    session: Arc<ProtocolSession>,
    translator: InputTranslator,
    capturer: ScreenCapturer,
    companion: Arc<dyn Companion>,
    mode: RwLock<Mode>,
    settle_delay: Duration,
    cue_timeout: Duration,
}

impl ActionExecutor {
    /// Creates an executor over `session`.
    #[must_use]
    pub fn new(
        session: Arc<ProtocolSession>,
        companion: Arc<dyn Companion>,
        config: &AgentConfig,
    ) -> Self {
        let mapper = Arc::new(CoordinateMapper::new());
        Self {
            translator: InputTranslator::new(Arc::clone(&session), config.input),
            capturer: ScreenCapturer::new(Arc::clone(&session), mapper, config.capture),
            session,
            companion,
            mode: RwLock::new(config.mode),
            settle_delay: config.settle_delay,
            cue_timeout: config.cue_timeout,
        }
    }

    /// Returns the session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Arc<ProtocolSession> {
        &self.session
    }

    /// Returns the companion.
    #[inline]
    #[must_use]
    pub fn companion(&self) -> &Arc<dyn Companion> {
        &self.companion
    }

    /// Returns the coordinate mapper fed by screenshots.
    #[inline]
    #[must_use]
    pub fn mapper(&self) -> &Arc<CoordinateMapper> {
        self.capturer.mapper()
    }

    /// Current mode.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> Mode {
        *self.mode.read()
    }

    /// Switches mode for subsequent actions.
    pub fn set_mode(&self, mode: Mode) {
        info!(?mode, "Execution mode changed");
        *self.mode.write() = mode;
    }

    /// Executes one action.
    ///
    /// Local failures of a dispatched action (for example an unknown
    /// scroll direction) come back as a text result.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAction`] if a required parameter is missing
    /// - [`Error::NoCaptureFrame`] if coordinates arrive before the first screenshot
    /// - [`Error::CueTimeout`] if the copilot acknowledgment does not arrive
    /// - session and screenshot errors once their retries are exhausted
    ///
    /// [`Error::InvalidAction`]: crate::error::Error::InvalidAction
    /// [`Error::NoCaptureFrame`]: crate::error::Error::NoCaptureFrame
    /// [`Error::CueTimeout`]: crate::error::Error::CueTimeout
    pub async fn execute(&self, action: &ActionDescriptor) -> Result<ActionResult> {
        let name = action.name();
        let mode = self.mode();
        debug!(action = %name, ?mode, "Executing action");

        if *name == ActionName::Screenshot {
            let screenshot = self.capturer.capture().await?;
            self.companion.send_action_title(name.title());
            return Ok(screenshot.into());
        }

        match mode {
            Mode::Autopilot => self.autopilot(action).await,
            Mode::Copilot => self.copilot(action).await,
        }
    }

    async fn autopilot(&self, action: &ActionDescriptor) -> Result<ActionResult> {
        self.session.ensure_ready().await?;

        let native = action.to_native(self.mapper())?;
        let input = native.to_input()?;

        if native.name().dispatches_input() {
            let delivered = self.companion.autopilot_cue(&native).await;
            debug!(action = %native.name(), delivered, "Autopilot cue sent");
        }

        let outcome = self.translator.perform(&input).await?;
        if let Some(text) = outcome.advisory {
            return Ok(ActionResult::text(text));
        }

        self.companion.send_action_title(native.name().title());

        if !outcome.success {
            let error = outcome
                .error
                .unwrap_or_else(|| format!("{} failed", native.name()));
            info!(action = %native.name(), %error, "Action failed locally");
            return Ok(ActionResult::text(error));
        }

        self.observe().await
    }

    async fn copilot(&self, action: &ActionDescriptor) -> Result<ActionResult> {
        let native = action.to_native(self.mapper())?;
        let input = native.to_input()?;
        if let Some(text) = input.advisory() {
            return Ok(ActionResult::text(text));
        }

        self.companion.copilot_cue(&native, self.cue_timeout).await?;
        self.companion.send_action_title(native.name().title());
        self.observe().await
    }

    /// Waits for the page to settle and captures the follow-up screenshot.
    async fn observe(&self) -> Result<ActionResult> {
        sleep(self.settle_delay).await;
        let screenshot = self.capturer.capture().await?;
        self.companion
            .send_action_title(ActionName::Screenshot.title());
        Ok(screenshot.into())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::agent::companion::{ChannelCompanion, CompanionMessage, NoopCompanion};
    use crate::error::Error;
    use crate::input::{CURSOR_POSITION_ADVICE, MOUSE_BUTTON_ADVICE};
    use crate::session::DebuggerBackend;
    use crate::session::mock::MockBackend;

    fn config(mode: Mode) -> AgentConfig {
        AgentConfig::builder()
            .immediate()
            .mode(mode)
            .build()
            .expect("valid config")
    }

    fn executor_with(
        backend: &Arc<MockBackend>,
        companion: Arc<dyn Companion>,
        mode: Mode,
    ) -> ActionExecutor {
        let config = config(mode);
        let backend = Arc::clone(backend) as Arc<dyn DebuggerBackend>;
        let session = Arc::new(ProtocolSession::new(backend, config.session.clone()));
        ActionExecutor::new(session, companion, &config)
    }

    fn action(input: Value) -> ActionDescriptor {
        ActionDescriptor::from_tool_input(&input).expect("valid action")
    }

    fn drain(rx: &mut UnboundedReceiver<CompanionMessage>) -> Vec<CompanionMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn mouse_types(backend: &MockBackend) -> Vec<String> {
        backend
            .commands("Input.dispatchMouseEvent")
            .iter()
            .map(|p| p["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_screenshot_installs_frame_and_titles() {
        let backend = Arc::new(MockBackend::new());
        backend.serve_screen(2048, 1536, 1.0);
        let (companion, mut rx) = ChannelCompanion::new();
        let executor = executor_with(&backend, Arc::new(companion), Mode::Autopilot);

        let result = executor
            .execute(&action(json!({"action": "screenshot"})))
            .await
            .expect("screenshot");

        assert!(result.is_image());
        assert!(executor.mapper().frame().is_some());
        assert_eq!(
            drain(&mut rx),
            [CompanionMessage::ActionResponse {
                title: ActionName::Screenshot.title().to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_left_click_maps_and_observes() {
        let backend = Arc::new(MockBackend::new());
        backend.serve_screen(2048, 1536, 1.0);
        let (companion, mut rx) = ChannelCompanion::new();
        let executor = executor_with(&backend, Arc::new(companion), Mode::Autopilot);

        executor
            .execute(&action(json!({"action": "screenshot"})))
            .await
            .expect("screenshot");
        drain(&mut rx);

        let result = executor
            .execute(&action(json!({"action": "left_click", "coordinate": [512, 384]})))
            .await
            .expect("click");

        assert!(result.is_image());
        let mouse = backend.commands("Input.dispatchMouseEvent");
        assert_eq!(mouse_types(&backend), ["mousePressed", "mouseReleased"]);
        assert_eq!(mouse[0]["x"], 1024.0);
        assert_eq!(mouse[0]["y"], 768.0);

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 3);
        assert!(matches!(
            &messages[0],
            CompanionMessage::AutopilotCue { action_name, payload, .. }
                if action_name == "left_click" && payload["coordinate"] == json!([1024.0, 768.0])
        ));
        assert_eq!(
            messages[1],
            CompanionMessage::ActionResponse {
                title: ActionName::LeftClick.title().to_string()
            }
        );
        assert_eq!(
            messages[2],
            CompanionMessage::ActionResponse {
                title: ActionName::Screenshot.title().to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_coordinates_before_screenshot_rejected() {
        let backend = Arc::new(MockBackend::new());
        let executor = executor_with(&backend, Arc::new(NoopCompanion), Mode::Autopilot);

        let err = executor
            .execute(&action(json!({"action": "left_click", "coordinate": [1, 1]})))
            .await
            .expect_err("no frame yet");

        assert!(matches!(err, Error::NoCaptureFrame));
        assert!(err.is_validation());
        assert!(backend.commands("Input.dispatchMouseEvent").is_empty());
    }

    #[tokio::test]
    async fn test_missing_text_is_validation_error() {
        let backend = Arc::new(MockBackend::new());
        let executor = executor_with(&backend, Arc::new(NoopCompanion), Mode::Autopilot);

        let err = executor
            .execute(&action(json!({"action": "type"})))
            .await
            .expect_err("text required");

        assert!(err.is_validation());
        assert!(backend.commands("Input.insertText").is_empty());
    }

    #[tokio::test]
    async fn test_local_failure_is_text_without_screenshot() {
        let backend = Arc::new(MockBackend::new());
        backend.serve_screen(1024, 768, 1.0);
        let executor = executor_with(&backend, Arc::new(NoopCompanion), Mode::Autopilot);
        executor
            .execute(&action(json!({"action": "screenshot"})))
            .await
            .expect("screenshot");

        let result = executor
            .execute(&action(json!({
                "action": "scroll",
                "coordinate": [10, 10],
                "scroll_direction": "sideways",
                "scroll_amount": 2
            })))
            .await
            .expect("local failure is not an error");

        assert_eq!(
            result,
            ActionResult::text(
                "Invalid scroll direction: sideways. Must be up, down, left, or right."
            )
        );
        assert_eq!(backend.commands("Page.captureScreenshot").len(), 1);
    }

    #[tokio::test]
    async fn test_advisory_verbs_return_fixed_text() {
        let backend = Arc::new(MockBackend::new());
        let executor = executor_with(&backend, Arc::new(NoopCompanion), Mode::Autopilot);

        let result = executor
            .execute(&action(json!({"action": "cursor_position"})))
            .await
            .expect("advisory");
        assert_eq!(result, ActionResult::text(CURSOR_POSITION_ADVICE));

        executor.set_mode(Mode::Copilot);
        let result = executor
            .execute(&action(json!({"action": "left_mouse_down"})))
            .await
            .expect("advisory");
        assert_eq!(result, ActionResult::text(MOUSE_BUTTON_ADVICE));
        assert!(backend.commands("Page.captureScreenshot").is_empty());
    }

    #[tokio::test]
    async fn test_session_loss_is_terminal() {
        let backend = Arc::new(MockBackend::empty());
        let executor = executor_with(&backend, Arc::new(NoopCompanion), Mode::Autopilot);

        let err = executor
            .execute(&action(json!({"action": "type", "text": "hi"})))
            .await
            .expect_err("no tabs");

        assert!(!err.is_validation());
    }

    #[tokio::test]
    async fn test_copilot_waits_for_user() {
        let backend = Arc::new(MockBackend::new());
        backend.serve_screen(1024, 768, 1.0);
        let (companion, mut rx) = ChannelCompanion::new();
        let companion = Arc::new(companion);
        let executor = executor_with(
            &backend,
            Arc::clone(&companion) as Arc<dyn Companion>,
            Mode::Copilot,
        );

        let acker = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let CompanionMessage::CopilotCue { cue_id, .. } = message {
                    companion.acknowledge(cue_id);
                }
            }
        });

        let result = executor
            .execute(&action(json!({"action": "type", "text": "hello"})))
            .await
            .expect("acknowledged");

        assert!(result.is_image());
        assert!(backend.commands("Input.insertText").is_empty());
        acker.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_copilot_timeout_is_terminal() {
        let backend = Arc::new(MockBackend::new());
        let (companion, _rx) = ChannelCompanion::new();
        let executor = executor_with(&backend, Arc::new(companion), Mode::Copilot);

        let err = executor
            .execute(&action(json!({"action": "key", "text": "Enter"})))
            .await
            .expect_err("nobody acknowledges");

        assert!(matches!(err, Error::CueTimeout { timeout_ms: 60_000, .. }));
        assert!(!err.is_validation());
        assert!(backend.commands("Page.captureScreenshot").is_empty());
    }
}
