//! Action descriptors parsed from policy tool input.
//!
//! Tool input is a JSON object carrying an `action` verb plus verb-specific
//! fields:
//!
//! ```json
//! { "action": "left_click", "coordinate": [512, 384] }
//! { "action": "scroll", "coordinate": [10, 10], "scroll_direction": "down", "scroll_amount": 3 }
//! { "action": "hold_key", "text": "shift", "duration": 2 }
//! ```
//!
//! Descriptors are immutable. Coordinate conversion derives a new
//! descriptor in native pixels.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::input::{ClickKind, InputAction};
use crate::screen::{CoordinateMapper, Point};

// ============================================================================
// Constants
// ============================================================================

/// Hold duration used when `hold_key` omits one.
const DEFAULT_HOLD_SECONDS: f64 = 1.0;

// ============================================================================
// ActionName
// ============================================================================

/// Action verbs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionName {
    /// Capture the screen.
    Screenshot,
    /// Single primary click.
    LeftClick,
    /// Double click.
    DoubleClick,
    /// Triple click.
    TripleClick,
    /// Secondary click.
    RightClick,
    /// Auxiliary click.
    MiddleClick,
    /// Drag with the primary button.
    LeftClickDrag,
    /// Hover.
    MouseMove,
    /// Insert text.
    Type,
    /// Press a key combo.
    Key,
    /// Hold a key combo.
    HoldKey,
    /// Scroll the wheel.
    Scroll,
    /// Wait.
    Wait,
    /// Ask for the cursor position.
    CursorPosition,
    /// Raw primary button down.
    LeftMouseDown,
    /// Raw primary button up.
    LeftMouseUp,
    /// Anything else.
    Other(String),
}

impl ActionName {
    /// Parses a wire verb.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "screenshot" => Self::Screenshot,
            "left_click" => Self::LeftClick,
            "double_click" => Self::DoubleClick,
            "triple_click" => Self::TripleClick,
            "right_click" => Self::RightClick,
            "middle_click" => Self::MiddleClick,
            "left_click_drag" => Self::LeftClickDrag,
            "mouse_move" => Self::MouseMove,
            "type" => Self::Type,
            "key" => Self::Key,
            "hold_key" => Self::HoldKey,
            "scroll" => Self::Scroll,
            "wait" => Self::Wait,
            "cursor_position" => Self::CursorPosition,
            "left_mouse_down" => Self::LeftMouseDown,
            "left_mouse_up" => Self::LeftMouseUp,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire verb.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Screenshot => "screenshot",
            Self::LeftClick => "left_click",
            Self::DoubleClick => "double_click",
            Self::TripleClick => "triple_click",
            Self::RightClick => "right_click",
            Self::MiddleClick => "middle_click",
            Self::LeftClickDrag => "left_click_drag",
            Self::MouseMove => "mouse_move",
            Self::Type => "type",
            Self::Key => "key",
            Self::HoldKey => "hold_key",
            Self::Scroll => "scroll",
            Self::Wait => "wait",
            Self::CursorPosition => "cursor_position",
            Self::LeftMouseDown => "left_mouse_down",
            Self::LeftMouseUp => "left_mouse_up",
            Self::Other(name) => name,
        }
    }

    /// Human-readable title shown by the companion.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Screenshot => "📸 Taking a screenshot",
            Self::LeftClick => "👆 Left click",
            Self::DoubleClick => "👆👆 Double click",
            Self::TripleClick => "👆👆👆 Triple click",
            Self::RightClick => "👉 Right click",
            Self::MiddleClick => "🖲️ Middle click",
            Self::LeftClickDrag => "🖱️➡️ Dragging with left click",
            Self::MouseMove => "🖱️ Moving the mouse",
            Self::Type => "⌨️ Typing text",
            Self::Key => "🎹 Pressing a key",
            Self::HoldKey => "🎹⏳ Holding a key",
            Self::Scroll => "🔽 Scrolling",
            Self::Wait => "🕒 Waiting",
            _ => "❓ Unknown action",
        }
    }

    /// Returns `true` for verbs whose coordinates are canvas points.
    #[must_use]
    pub fn uses_coordinates(&self) -> bool {
        matches!(
            self,
            Self::LeftClick
                | Self::DoubleClick
                | Self::TripleClick
                | Self::RightClick
                | Self::MiddleClick
                | Self::MouseMove
                | Self::Scroll
                | Self::LeftClickDrag
        )
    }

    /// Returns `true` for verbs that dispatch input events.
    #[must_use]
    pub fn dispatches_input(&self) -> bool {
        self.uses_coordinates() || matches!(self, Self::Type | Self::Key | Self::HoldKey)
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ActionParams
// ============================================================================

/// Verb-specific parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionParams {
    /// Target point (end point for drags).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<[f64; 2]>,
    /// Drag start point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_coordinate: Option<[f64; 2]>,
    /// Text to type or key combo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Seconds, for `wait` and `hold_key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// `up`, `down`, `left` or `right`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_direction: Option<String>,
    /// Scroll notches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_amount: Option<u32>,
    /// Fields without a dedicated slot.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// ActionDescriptor
// ============================================================================

/// One requested action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDescriptor {
    name: ActionName,
    params: ActionParams,
}

impl ActionDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(name: ActionName, params: ActionParams) -> Self {
        Self { name, params }
    }

    /// Parses policy tool input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAction`] if `action` is missing or the
    /// parameters have the wrong shape.
    pub fn from_tool_input(input: &Value) -> Result<Self> {
        let mut fields = input.as_object().cloned().unwrap_or_default();
        let name = match fields.remove("action") {
            Some(Value::String(name)) if !name.is_empty() => ActionName::parse(&name),
            _ => return Err(Error::invalid_action("Input must contain an 'action' field")),
        };

        let params = serde_json::from_value(Value::Object(fields)).map_err(|e| {
            Error::invalid_action(format!("Invalid parameters for {name}: {e}"))
        })?;

        Ok(Self { name, params })
    }

    /// Returns the verb.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &ActionName {
        &self.name
    }

    /// Returns the parameters.
    #[inline]
    #[must_use]
    pub fn params(&self) -> &ActionParams {
        &self.params
    }

    /// Parameters as a JSON payload for companion cues.
    #[must_use]
    pub fn payload(&self) -> Value {
        serde_json::to_value(&self.params).unwrap_or(Value::Null)
    }

    /// Derives a copy with canvas coordinates mapped to native pixels.
    ///
    /// Verbs without coordinates are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCaptureFrame`] if a coordinate must be mapped
    /// before the first capture.
    pub fn to_native(&self, mapper: &CoordinateMapper) -> Result<Self> {
        if !self.name.uses_coordinates() {
            return Ok(self.clone());
        }

        let map = |point: Option<[f64; 2]>| -> Result<Option<[f64; 2]>> {
            point
                .map(|[x, y]| mapper.to_native(Point::new(x, y)).map(|p| [p.x, p.y]))
                .transpose()
        };

        let mut params = self.params.clone();
        params.coordinate = map(params.coordinate)?;
        if self.name == ActionName::LeftClickDrag {
            params.start_coordinate = map(params.start_coordinate)?;
        }

        Ok(Self {
            name: self.name.clone(),
            params,
        })
    }

    /// Builds the input action, treating coordinates as native pixels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAction`] if a required parameter is missing.
    pub fn to_input(&self) -> Result<InputAction> {
        let action = match &self.name {
            ActionName::LeftClick => self.click(ClickKind::Left)?,
            ActionName::DoubleClick => self.click(ClickKind::Double)?,
            ActionName::TripleClick => self.click(ClickKind::Triple)?,
            ActionName::RightClick => self.click(ClickKind::Right)?,
            ActionName::MiddleClick => self.click(ClickKind::Middle)?,
            ActionName::LeftClickDrag => InputAction::Drag {
                from: self.point(self.params.start_coordinate, "start_coordinate")?,
                to: self.point(self.params.coordinate, "coordinate")?,
            },
            ActionName::MouseMove => InputAction::MouseMove {
                at: self.point(self.params.coordinate, "coordinate")?,
            },
            ActionName::Scroll => InputAction::Scroll {
                at: self.point(self.params.coordinate, "coordinate")?,
                direction: self.require(self.params.scroll_direction.clone(), "scroll_direction")?,
                amount: self.require(self.params.scroll_amount, "scroll_amount")?,
            },
            ActionName::Type => InputAction::Type {
                text: self.text()?,
            },
            ActionName::Key => InputAction::Key { combo: self.text()? },
            ActionName::HoldKey => InputAction::HoldKey {
                combo: self.text()?,
                duration: self.seconds(self.params.duration.unwrap_or(DEFAULT_HOLD_SECONDS))?,
            },
            ActionName::Wait => InputAction::Wait {
                duration: self.seconds(self.require(self.params.duration, "duration")?)?,
            },
            ActionName::CursorPosition => InputAction::CursorPosition,
            ActionName::LeftMouseDown | ActionName::LeftMouseUp => InputAction::MouseButton,
            ActionName::Other(name) => InputAction::Unsupported { name: name.clone() },
            ActionName::Screenshot => {
                return Err(Error::invalid_action("screenshot has no input events"));
            }
        };
        Ok(action)
    }

    fn click(&self, kind: ClickKind) -> Result<InputAction> {
        Ok(InputAction::Click {
            kind,
            at: self.point(self.params.coordinate, "coordinate")?,
        })
    }

    fn point(&self, value: Option<[f64; 2]>, field: &str) -> Result<Point> {
        let [x, y] = self.require(value, field)?;
        Ok(Point::new(x, y))
    }

    fn text(&self) -> Result<String> {
        self.require(self.params.text.clone(), "text")
    }

    fn seconds(&self, seconds: f64) -> Result<Duration> {
        Duration::try_from_secs_f64(seconds.max(0.0)).map_err(|_| {
            Error::invalid_action(format!("Invalid duration for {}: {seconds}", self.name))
        })
    }

    fn require<T>(&self, value: Option<T>, field: &str) -> Result<T> {
        value.ok_or_else(|| Error::invalid_action(format!("{field} is required for {}", self.name)))
    }
}

// ============================================================================
// Tests
// ============================================================================
