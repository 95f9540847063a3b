//! High-level actions to low-level input event sequences.
//!
//! Every action that touches the page runs through the session's
//! [`ActionQueue`], so sequences never interleave.
//!
//! | Action | Events |
//! |--------|--------|
//! | Click | press, gap, release (multi-clicks repeat with rising click count) |
//! | Drag | press, pause, N interpolated moves, release |
//! | Scroll | `amount` wheel events of one notch each |
//! | Type | one `Input.insertText` |
//! | Key | modifiers down, key down, char, key up, modifiers up (reversed) |
//! | Hold key | like key, with auto-repeat while held |
//! | Wait | half the requested time; no events |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::InputTiming;
use crate::error::{Error, Result};
use crate::protocol::{InputCommand, KeyEvent, KeyEventType, MouseButton, MouseEvent, MouseEventType};
use crate::screen::Point;
use crate::session::ProtocolSession;

use super::keyboard::{KeyCombo, KeyDescriptor};
use super::queue::ActionQueue;

// ============================================================================
// Constants
// ============================================================================

/// Advisory returned for cursor position requests.
pub const CURSOR_POSITION_ADVICE: &str = "X=0, Y=0; Note that you are operating on a web browser. Your cursor should be at the last action you performed with coordinates";

/// Advisory returned for raw mouse button requests.
pub const MOUSE_BUTTON_ADVICE: &str = "This method is not allowed in the browser since you do not have the cursor position. If you'd like to press down the cursor and then move in any direction, consider simply clicking on the required position, then using the 'scroll' method to move in the spreadsheet or app.";

// ============================================================================
// Types
// ============================================================================

/// Click variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    /// Single primary click.
    Left,
    /// Two primary clicks.
    Double,
    /// Three primary clicks.
    Triple,
    /// Single secondary click.
    Right,
    /// Single auxiliary click.
    Middle,
}

impl ClickKind {
    #[inline]
    fn button(self) -> MouseButton {
        match self {
            ClickKind::Left | ClickKind::Double | ClickKind::Triple => MouseButton::Left,
            ClickKind::Right => MouseButton::Right,
            ClickKind::Middle => MouseButton::Middle,
        }
    }

    #[inline]
    fn clicks(self) -> u32 {
        match self {
            ClickKind::Double => 2,
            ClickKind::Triple => 3,
            _ => 1,
        }
    }
}

/// Scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    /// Negative vertical delta.
    Up,
    /// Positive vertical delta.
    Down,
    /// Negative horizontal delta.
    Left,
    /// Positive horizontal delta.
    Right,
}

impl ScrollDirection {
    /// Parses `up`, `down`, `left` or `right`.
    #[must_use]
    pub fn parse(direction: &str) -> Option<Self> {
        match direction {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    /// Unit `(dx, dy)` for this direction.
    #[inline]
    fn unit(self) -> (f64, f64) {
        match self {
            Self::Up => (0.0, -1.0),
            Self::Down => (0.0, 1.0),
            Self::Left => (-1.0, 0.0),
            Self::Right => (1.0, 0.0),
        }
    }
}

/// An action in native tab coordinates, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    /// Click family.
    Click {
        /// Variant.
        kind: ClickKind,
        /// Native point.
        at: Point,
    },
    /// Press, move, release.
    Drag {
        /// Native start point.
        from: Point,
        /// Native end point.
        to: Point,
    },
    /// Wheel scroll.
    Scroll {
        /// Native point.
        at: Point,
        /// Raw direction; validated on dispatch.
        direction: String,
        /// Number of notches.
        amount: u32,
    },
    /// Hover.
    MouseMove {
        /// Native point.
        at: Point,
    },
    /// Literal text insertion.
    Type {
        /// Text to insert.
        text: String,
    },
    /// Key combo press.
    Key {
        /// Combo string, e.g. `ctrl+c`.
        combo: String,
    },
    /// Key combo held for a duration.
    HoldKey {
        /// Combo string.
        combo: String,
        /// Hold duration.
        duration: Duration,
    },
    /// Pure delay; the requested duration is halved.
    Wait {
        /// Requested duration.
        duration: Duration,
    },
    /// Cursor position request; answered with advisory text.
    CursorPosition,
    /// Raw button down/up; answered with advisory text.
    MouseButton,
    /// Verb without an input mapping.
    Unsupported {
        /// Verb name.
        name: String,
    },
}

impl InputAction {
    /// Fixed text answered instead of dispatching, if any.
    #[must_use]
    pub fn advisory(&self) -> Option<&'static str> {
        match self {
            Self::CursorPosition => Some(CURSOR_POSITION_ADVICE),
            Self::MouseButton => Some(MOUSE_BUTTON_ADVICE),
            _ => None,
        }
    }
}

/// Uniform result of one dispatched action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Whether the action completed.
    pub success: bool,
    /// Failure description.
    pub error: Option<String>,
    /// Fixed text returned instead of dispatching.
    pub advisory: Option<&'static str>,
}

impl ActionOutcome {
    /// Completed action.
    #[inline]
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            advisory: None,
        }
    }

    /// Local failure; nothing was dispatched.
    #[inline]
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            advisory: None,
        }
    }

    /// Advisory text; nothing was dispatched.
    #[inline]
    #[must_use]
    pub fn advisory(text: &'static str) -> Self {
        Self {
            success: true,
            error: None,
            advisory: Some(text),
        }
    }
}

// ============================================================================
// InputTranslator
// ============================================================================

/// Translates [`InputAction`]s into protocol input events.
pub struct InputTranslator {
    session: Arc<ProtocolSession>,
    queue: ActionQueue,
    timing: InputTiming,
}

impl InputTranslator {
    /// Creates a translator dispatching through `session`.
    #[must_use]
    pub fn new(session: Arc<ProtocolSession>, timing: InputTiming) -> Self {
        Self {
            session,
            queue: ActionQueue::new(),
            timing,
        }
    }

    /// Returns the action queue.
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// Performs one action.
    ///
    /// Local validation failures come back as a failed [`ActionOutcome`]
    /// without any protocol call.
    ///
    /// # Errors
    ///
    /// Returns the session error once its retries are exhausted.
    pub async fn perform(&self, action: &InputAction) -> Result<ActionOutcome> {
        match action {
            InputAction::Click { kind, at } => self.click(*kind, *at).await,
            InputAction::Drag { from, to } => self.drag(*from, *to).await,
            InputAction::Scroll {
                at,
                direction,
                amount,
            } => self.scroll(*at, direction, *amount).await,
            InputAction::MouseMove { at } => self.mouse_move(*at).await,
            InputAction::Type { text } => self.type_text(text).await,
            InputAction::Key { combo } => self.press_key(combo).await,
            InputAction::HoldKey { combo, duration } => self.hold_key(combo, *duration).await,
            InputAction::Wait { duration } => {
                self.wait(*duration).await;
                Ok::<_, Error>(ActionOutcome::ok())
            }
            InputAction::CursorPosition | InputAction::MouseButton => {
                Ok(ActionOutcome::advisory(action.advisory().unwrap_or_default()))
            }
            InputAction::Unsupported { name } => {
                info!(action = %name, "Unsupported action, ignoring");
                Ok::<_, Error>(ActionOutcome::ok())
            }
        }
    }

    // ========================================================================
    // Mouse
    // ========================================================================

    /// Clicks at `at`.
    ///
    /// # Errors
    ///
    /// Returns the session error once its retries are exhausted.
    pub async fn click(&self, kind: ClickKind, at: Point) -> Result<ActionOutcome> {
        self.queue
            .enqueue(async {
                let button = kind.button();
                let clicks = kind.clicks();

                for count in 1..=clicks {
                    if count > 1 {
                        self.pause(self.multi_click_gap(kind)).await;
                    }
                    self.mouse(MouseEvent::button(MouseEventType::Pressed, at.x, at.y, button, count))
                        .await?;
                    if clicks == 1 {
                        self.pause(self.timing.click_gap).await;
                    }
                    self.mouse(MouseEvent::button(MouseEventType::Released, at.x, at.y, button, count))
                        .await?;
                }

                debug!(?kind, x = at.x, y = at.y, "Clicked");
                Ok::<_, Error>(ActionOutcome::ok())
            })
            .await
    }

    /// Drags with the primary button from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns the session error once its retries are exhausted.
    pub async fn drag(&self, from: Point, to: Point) -> Result<ActionOutcome> {
        self.queue
            .enqueue(async {
                self.mouse(MouseEvent::button(
                    MouseEventType::Pressed,
                    from.x,
                    from.y,
                    MouseButton::Left,
                    1,
                ))
                .await?;
                self.pause(self.timing.drag_start_pause).await;

                let steps = self.timing.drag_steps.max(1);
                for step in 1..=steps {
                    let progress = f64::from(step) / f64::from(steps);
                    let x = (from.x + (to.x - from.x) * progress).round();
                    let y = (from.y + (to.y - from.y) * progress).round();
                    self.mouse(MouseEvent::moved(x, y, MouseButton::Left)).await?;
                    self.pause(self.timing.drag_step_delay).await;
                }

                self.mouse(MouseEvent::button(
                    MouseEventType::Released,
                    to.x,
                    to.y,
                    MouseButton::Left,
                    1,
                ))
                .await?;

                debug!(from = ?from, to = ?to, steps, "Dragged");
                Ok::<_, Error>(ActionOutcome::ok())
            })
            .await
    }

    /// Scrolls `amount` notches in `direction` at `at`.
    ///
    /// An unknown direction fails locally without dispatching.
    ///
    /// # Errors
    ///
    /// Returns the session error once its retries are exhausted.
    pub async fn scroll(&self, at: Point, direction: &str, amount: u32) -> Result<ActionOutcome> {
        let Some(parsed) = ScrollDirection::parse(direction) else {
            warn!(direction, "Invalid scroll direction");
            return Ok(ActionOutcome::failed(format!(
                "Invalid scroll direction: {direction}. Must be up, down, left, or right."
            )));
        };

        self.queue
            .enqueue(async {
                let (ux, uy) = parsed.unit();
                let delta = self.timing.scroll_delta;

                for _ in 0..amount {
                    self.mouse(MouseEvent::wheel(at.x, at.y, ux * delta, uy * delta))
                        .await?;
                    self.pause(self.timing.scroll_pause).await;
                }

                debug!(direction, amount, "Scrolled");
                Ok::<_, Error>(ActionOutcome::ok())
            })
            .await
    }

    /// Moves the pointer to `at` with no button held.
    ///
    /// # Errors
    ///
    /// Returns the session error once its retries are exhausted.
    pub async fn mouse_move(&self, at: Point) -> Result<ActionOutcome> {
        self.queue
            .enqueue(async {
                self.mouse(MouseEvent::moved(at.x, at.y, MouseButton::None))
                    .await?;
                Ok::<_, Error>(ActionOutcome::ok())
            })
            .await
    }

    // ========================================================================
    // Keyboard
    // ========================================================================

    /// Inserts `text` in one event.
    ///
    /// # Errors
    ///
    /// Returns the session error once its retries are exhausted.
    pub async fn type_text(&self, text: &str) -> Result<ActionOutcome> {
        self.queue
            .enqueue(async {
                self.session
                    .execute(InputCommand::InsertText {
                        text: text.to_string(),
                    })
                    .await?;
                Ok::<_, Error>(ActionOutcome::ok())
            })
            .await
    }

    /// Presses and releases a key combo.
    ///
    /// # Errors
    ///
    /// Returns the session error once its retries are exhausted.
    pub async fn press_key(&self, combo: &str) -> Result<ActionOutcome> {
        let parsed = parse_combo(combo);

        self.queue
            .enqueue(async {
                let mask = parsed.modifier_mask();
                self.press_modifiers(&parsed).await?;

                if let Some(main) = parsed.main_key() {
                    self.key_down(main, mask, false).await?;
                    self.key(key_event(KeyEventType::KeyUp, main, mask)).await?;
                }

                self.release_modifiers(&parsed).await?;
                debug!(combo, mask, "Pressed key");
                Ok::<_, Error>(ActionOutcome::ok())
            })
            .await
    }

    /// Holds a key combo for `duration`, emitting auto-repeat events.
    ///
    /// Repeats start after the initial delay and fire at the repeat interval
    /// for the rest of the duration. Shorter holds just wait and release.
    ///
    /// # Errors
    ///
    /// Returns the session error once its retries are exhausted.
    pub async fn hold_key(&self, combo: &str, duration: Duration) -> Result<ActionOutcome> {
        let parsed = parse_combo(combo);

        self.queue
            .enqueue(async {
                let mask = parsed.modifier_mask();
                self.press_modifiers(&parsed).await?;

                if let Some(main) = parsed.main_key() {
                    self.key_down(main, mask, false).await?;

                    let initial = self.timing.hold_initial_delay;
                    let interval = self.timing.hold_repeat_interval;
                    if duration <= initial {
                        self.pause(duration).await;
                    } else {
                        self.pause(initial).await;
                        let remaining = duration - initial;
                        let repeats = repeat_count(remaining, interval);

                        for _ in 0..repeats {
                            self.key_down(main, mask, true).await?;
                            self.pause(interval).await;
                        }
                        self.pause(remaining.saturating_sub(interval * repeats)).await;
                        debug!(combo, repeats, "Auto-repeat finished");
                    }

                    self.key(key_event(KeyEventType::KeyUp, main, mask)).await?;
                } else {
                    self.pause(duration).await;
                }

                self.release_modifiers(&parsed).await?;
                Ok::<_, Error>(ActionOutcome::ok())
            })
            .await
    }

    /// Sleeps for half of `requested`.
    pub async fn wait(&self, requested: Duration) {
        sleep(requested / 2).await;
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn mouse(&self, event: MouseEvent) -> Result<()> {
        self.session
            .execute(InputCommand::DispatchMouseEvent(event))
            .await
            .map(drop)
    }

    async fn key(&self, event: KeyEvent) -> Result<()> {
        self.session
            .execute(InputCommand::DispatchKeyEvent(event))
            .await
            .map(drop)
    }

    /// Key down plus a char event for printable, unmodified keys.
    async fn key_down(&self, key: &KeyDescriptor, mask: u8, auto_repeat: bool) -> Result<()> {
        let mut down = key_event(KeyEventType::KeyDown, key, mask);
        if auto_repeat {
            down.auto_repeat = Some(true);
        }
        self.key(down).await?;

        if let Some(text) = key.text()
            && mask == 0
        {
            self.key(KeyEvent {
                event_type: KeyEventType::Char,
                modifiers: mask,
                windows_virtual_key_code: None,
                code: None,
                key: Some(key.key().to_string()),
                text: Some(text.to_string()),
                auto_repeat: None,
            })
            .await?;
        }
        Ok(())
    }

    async fn press_modifiers(&self, combo: &KeyCombo) -> Result<()> {
        for modifier in combo.modifiers() {
            self.key(key_event(KeyEventType::KeyDown, modifier, combo.modifier_mask()))
                .await?;
        }
        Ok(())
    }

    async fn release_modifiers(&self, combo: &KeyCombo) -> Result<()> {
        for modifier in combo.modifiers().iter().rev() {
            self.key(key_event(KeyEventType::KeyUp, modifier, combo.modifier_mask()))
                .await?;
        }
        Ok(())
    }

    fn multi_click_gap(&self, kind: ClickKind) -> Duration {
        match kind {
            ClickKind::Triple => self.timing.triple_click_gap,
            _ => self.timing.double_click_gap,
        }
    }

    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            sleep(duration).await;
        }
    }
}

fn parse_combo(combo: &str) -> KeyCombo {
    let parsed = KeyCombo::parse(combo);
    if !parsed.ignored().is_empty() {
        let ignored: Vec<&str> = parsed.ignored().iter().map(KeyDescriptor::logical_name).collect();
        warn!(combo, ?ignored, "Only the first main key is dispatched");
    }
    if parsed.is_empty() {
        warn!(combo, "Key combo resolved to nothing");
    }
    parsed
}

fn key_event(event_type: KeyEventType, key: &KeyDescriptor, mask: u8) -> KeyEvent {
    KeyEvent {
        event_type,
        modifiers: mask,
        windows_virtual_key_code: Some(key.key_code()),
        code: (!key.code().is_empty()).then(|| key.code().to_string()),
        key: Some(key.key().to_string()),
        text: None,
        auto_repeat: None,
    }
}

fn repeat_count(remaining: Duration, interval: Duration) -> u32 {
    if interval.is_zero() {
        return 0;
    }
    u32::try_from(remaining.as_nanos() / interval.as_nanos()).unwrap_or(u32::MAX)
}

// ============================================================================
// Tests
// ============================================================================
