//! Command definitions organized by protocol domain.
//!
//! Commands follow the `Domain.methodName` format of the remote debugging
//! protocol.
//!
//! # Command Domains
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Input` | Mouse, keyboard and text insertion |
//! | `Runtime` | Expression evaluation (liveness probe, page metrics) |
//! | `Target` | Discovery, attach/detach, target info |
//! | `Page` | Lifecycle events, screenshots |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::TargetId;

// ============================================================================
// Command Wrapper
// ============================================================================

/// All protocol commands organized by domain.
///
/// This enum wraps domain-specific command enums for unified serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Input domain commands.
    Input(InputCommand),
    /// Runtime domain commands.
    Runtime(RuntimeCommand),
    /// Target domain commands.
    Target(TargetCommand),
    /// Page domain commands.
    Page(PageCommand),
}

impl Command {
    /// Splits the command into its method name and params object.
    ///
    /// Parameterless commands yield an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails, or
    /// [`Error::Protocol`] if the command has no method tag.
    pub fn into_parts(self) -> Result<(String, Value)> {
        let mut value = serde_json::to_value(self)?;
        let object = value
            .as_object_mut()
            .ok_or_else(|| Error::protocol("Command did not serialize to an object"))?;

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(Error::protocol("Command is missing its method")),
        };
        let params = object
            .remove("params")
            .unwrap_or_else(|| Value::Object(Map::new()));

        Ok((method, params))
    }
}

impl From<InputCommand> for Command {
    fn from(command: InputCommand) -> Self {
        Self::Input(command)
    }
}

impl From<RuntimeCommand> for Command {
    fn from(command: RuntimeCommand) -> Self {
        Self::Runtime(command)
    }
}

impl From<TargetCommand> for Command {
    fn from(command: TargetCommand) -> Self {
        Self::Target(command)
    }
}

impl From<PageCommand> for Command {
    fn from(command: PageCommand) -> Self {
        Self::Page(command)
    }
}

// ============================================================================
// Input Commands
// ============================================================================

/// Input domain commands for keyboard and mouse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum InputCommand {
    /// Dispatch a mouse event to the page.
    #[serde(rename = "Input.dispatchMouseEvent")]
    DispatchMouseEvent(MouseEvent),

    /// Dispatch a key event to the page.
    #[serde(rename = "Input.dispatchKeyEvent")]
    DispatchKeyEvent(KeyEvent),

    /// Insert text as if typed, without key events.
    #[serde(rename = "Input.insertText")]
    InsertText {
        /// Literal text to insert.
        text: String,
    },
}

/// Mouse event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseEventType {
    /// Button pressed.
    #[serde(rename = "mousePressed")]
    Pressed,
    /// Button released.
    #[serde(rename = "mouseReleased")]
    Released,
    /// Pointer moved.
    #[serde(rename = "mouseMoved")]
    Moved,
    /// Wheel scrolled.
    #[serde(rename = "mouseWheel")]
    Wheel,
}

/// Mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    /// No button (pointer moves).
    None,
    /// Primary button.
    Left,
    /// Auxiliary button.
    Middle,
    /// Secondary button.
    Right,
}

/// Parameters of `Input.dispatchMouseEvent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseEvent {
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: MouseEventType,
    /// X coordinate in CSS pixels.
    pub x: f64,
    /// Y coordinate in CSS pixels.
    pub y: f64,
    /// Button involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<MouseButton>,
    /// Click count marker for multi-clicks.
    #[serde(rename = "clickCount", skip_serializing_if = "Option::is_none")]
    pub click_count: Option<u32>,
    /// Horizontal wheel delta.
    #[serde(rename = "deltaX", skip_serializing_if = "Option::is_none")]
    pub delta_x: Option<f64>,
    /// Vertical wheel delta.
    #[serde(rename = "deltaY", skip_serializing_if = "Option::is_none")]
    pub delta_y: Option<f64>,
}

impl MouseEvent {
    /// Creates a button press or release.
    #[must_use]
    pub fn button(
        event_type: MouseEventType,
        x: f64,
        y: f64,
        button: MouseButton,
        click_count: u32,
    ) -> Self {
        Self {
            event_type,
            x,
            y,
            button: Some(button),
            click_count: Some(click_count),
            delta_x: None,
            delta_y: None,
        }
    }

    /// Creates a pointer move carrying the given button state.
    #[inline]
    #[must_use]
    pub fn moved(x: f64, y: f64, button: MouseButton) -> Self {
        let click_count = if button == MouseButton::None { 0 } else { 1 };
        Self::button(MouseEventType::Moved, x, y, button, click_count)
    }

    /// Creates a wheel event.
    #[must_use]
    pub fn wheel(x: f64, y: f64, delta_x: f64, delta_y: f64) -> Self {
        Self {
            event_type: MouseEventType::Wheel,
            x,
            y,
            button: None,
            click_count: None,
            delta_x: Some(delta_x),
            delta_y: Some(delta_y),
        }
    }
}

/// Key event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyEventType {
    /// Key pressed.
    KeyDown,
    /// Key released.
    KeyUp,
    /// Character produced.
    Char,
}

/// Parameters of `Input.dispatchKeyEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: KeyEventType,
    /// Modifier bitmask (alt=1, ctrl=2, meta=4, shift=8).
    pub modifiers: u8,
    /// Windows virtual key code.
    #[serde(rename = "windowsVirtualKeyCode", skip_serializing_if = "Option::is_none")]
    pub windows_virtual_key_code: Option<u32>,
    /// Physical key code (e.g. `KeyA`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Logical key value (e.g. `a`, `Enter`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Text produced by the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Synthetic auto-repeat marker.
    #[serde(rename = "autoRepeat", skip_serializing_if = "Option::is_none")]
    pub auto_repeat: Option<bool>,
}

// ============================================================================
// Runtime Commands
// ============================================================================

/// Expression used to probe session liveness.
pub const LIVENESS_EXPRESSION: &str = "1+1";

/// Expression reading the page's device pixel ratio.
pub const DEVICE_PIXEL_RATIO_EXPRESSION: &str = "window.devicePixelRatio";

/// Runtime domain commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RuntimeCommand {
    /// Evaluate an expression in the page's main world.
    #[serde(rename = "Runtime.evaluate")]
    Evaluate {
        /// JavaScript expression.
        expression: String,
        /// Return the result by value instead of by object reference.
        #[serde(rename = "returnByValue", skip_serializing_if = "Option::is_none")]
        return_by_value: Option<bool>,
    },
}

impl RuntimeCommand {
    /// The liveness probe evaluated after attach and before actions.
    #[inline]
    #[must_use]
    pub fn liveness_probe() -> Self {
        Self::Evaluate {
            expression: LIVENESS_EXPRESSION.to_string(),
            return_by_value: None,
        }
    }

    /// Reads `window.devicePixelRatio` by value.
    #[inline]
    #[must_use]
    pub fn device_pixel_ratio() -> Self {
        Self::Evaluate {
            expression: DEVICE_PIXEL_RATIO_EXPRESSION.to_string(),
            return_by_value: Some(true),
        }
    }
}

// ============================================================================
// Target Commands
// ============================================================================

/// Target domain commands, sent at browser level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum TargetCommand {
    /// Enable target discovery notifications.
    #[serde(rename = "Target.setDiscoverTargets")]
    SetDiscoverTargets {
        /// Whether to discover targets.
        discover: bool,
    },

    /// Attach to a target and obtain a session id.
    #[serde(rename = "Target.attachToTarget")]
    AttachToTarget {
        /// Target to attach to.
        #[serde(rename = "targetId")]
        target_id: TargetId,
        /// Use flattened session addressing.
        flatten: bool,
    },

    /// Detach a session from its target.
    #[serde(rename = "Target.detachFromTarget")]
    DetachFromTarget {
        /// Session to detach.
        #[serde(rename = "sessionId")]
        session_id: String,
    },

    /// Get info about a target.
    #[serde(rename = "Target.getTargetInfo")]
    GetTargetInfo {
        /// Target to describe.
        #[serde(rename = "targetId")]
        target_id: TargetId,
    },

    /// List all targets.
    #[serde(rename = "Target.getTargets")]
    GetTargets,
}

// ============================================================================
// Page Commands
// ============================================================================

/// Page domain commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum PageCommand {
    /// Enable page lifecycle events.
    #[serde(rename = "Page.enable")]
    Enable,

    /// Capture a screenshot of the viewport.
    #[serde(rename = "Page.captureScreenshot")]
    CaptureScreenshot {
        /// Image format (`png` or `jpeg`).
        format: String,
    },
}

impl PageCommand {
    /// PNG viewport capture.
    #[inline]
    #[must_use]
    pub fn capture_png() -> Self {
        Self::CaptureScreenshot {
            format: "png".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
