//! Capture frame geometry and canvas-to-native coordinate mapping.
//!
//! Screenshots are letterboxed onto a fixed canvas (1024×768 by default).
//! The [`CoordinateFrame`] recorded during normalization inverts that
//! transform for points the policy picks on the canvas.
//!
//! ```text
//! native.x = round(clamp(canvas.x * scale_x - padding_left, 0, width - 1))
//! native.y = round(clamp(canvas.y * scale_y - padding_top,  0, height - 1))
//! ```

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;

use crate::error::{Error, Result};

// ============================================================================
// Point
// ============================================================================

/// A 2D point in canvas or native pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a point.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// ============================================================================
// CoordinateFrame
// ============================================================================

/// Geometry of the most recent screenshot normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateFrame {
    /// Native capture width (after device pixel ratio scaling).
    pub native_width: u32,
    /// Native capture height (after device pixel ratio scaling).
    pub native_height: u32,
    /// Rows of padding added above the capture.
    pub padding_top: u32,
    /// Columns of padding added left of the capture.
    pub padding_left: u32,
    /// Padded width divided by canvas width.
    pub scale_x: f64,
    /// Padded height divided by canvas height.
    pub scale_y: f64,
}

impl CoordinateFrame {
    /// Computes the letterbox for a `width`×`height` capture on a
    /// `canvas_width`×`canvas_height` canvas.
    ///
    /// Captures wider than the canvas aspect are padded top and bottom with
    /// the image centered; others are padded on the right.
    #[must_use]
    pub fn letterbox(width: u32, height: u32, canvas_width: u32, canvas_height: u32) -> Self {
        let (w, h) = (f64::from(width.max(1)), f64::from(height.max(1)));
        let (cw, ch) = (f64::from(canvas_width.max(1)), f64::from(canvas_height.max(1)));
        let target_ratio = cw / ch;

        let (padded_w, padded_h, padding_top) = if w / h > target_ratio {
            let padded_h = (w / target_ratio).round();
            let padding_top = ((padded_h - h) / 2.0).floor();
            (w, padded_h, padding_top)
        } else {
            ((h * target_ratio).round(), h, 0.0)
        };

        Self {
            native_width: width,
            native_height: height,
            padding_top: padding_top as u32,
            padding_left: 0,
            scale_x: padded_w / cw,
            scale_y: padded_h / ch,
        }
    }

    /// Padded canvas size `(width, height)` before resizing.
    #[must_use]
    pub fn padded_size(&self, canvas_width: u32, canvas_height: u32) -> (u32, u32) {
        (
            (f64::from(canvas_width) * self.scale_x).round() as u32,
            (f64::from(canvas_height) * self.scale_y).round() as u32,
        )
    }

    /// Maps a canvas point to native pixels, clamped to the capture bounds.
    #[must_use]
    pub fn to_native(&self, canvas: Point) -> Point {
        let max_x = f64::from(self.native_width.saturating_sub(1));
        let max_y = f64::from(self.native_height.saturating_sub(1));

        let x = canvas.x * self.scale_x - f64::from(self.padding_left);
        let y = canvas.y * self.scale_y - f64::from(self.padding_top);

        Point::new(x.clamp(0.0, max_x).round(), y.clamp(0.0, max_y).round())
    }
}

// ============================================================================
// CoordinateMapper
// ============================================================================

/// Holds the current [`CoordinateFrame`].
///
/// Each capture replaces the frame as a whole; readers never see a frame
/// mixing two captures.
#[derive(Debug, Default)]
pub struct CoordinateMapper {
    frame: RwLock<Option<CoordinateFrame>>,
}

impl CoordinateMapper {
    /// Creates a mapper with no frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the frame of a new capture.
    pub fn replace(&self, frame: CoordinateFrame) {
        *self.frame.write() = Some(frame);
    }

    /// Returns the current frame.
    #[must_use]
    pub fn frame(&self) -> Option<CoordinateFrame> {
        *self.frame.read()
    }

    /// Maps a canvas point to native pixels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCaptureFrame`] before the first capture.
    pub fn to_native(&self, canvas: Point) -> Result<Point> {
        self.frame()
            .map(|frame| frame.to_native(canvas))
            .ok_or(Error::NoCaptureFrame)
    }
}

// ============================================================================
// Tests
// ============================================================================
