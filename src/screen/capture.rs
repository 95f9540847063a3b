//! Screenshot capture and normalization.
//!
//! A capture goes through four steps:
//!
//! 1. `Page.captureScreenshot` (PNG), retried a few times
//! 2. downscale by `window.devicePixelRatio` to CSS pixels
//! 3. letterbox onto the canvas aspect ratio with black padding
//! 4. resize to the canvas and re-encode as base64 PNG
//!
//! The letterbox geometry is installed into the shared
//! [`CoordinateMapper`] so later actions map canvas points correctly.

// ============================================================================
// Imports
// ============================================================================

use std::io::Cursor;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::CaptureOptions;
use crate::error::{Error, Result};
use crate::protocol::{PageCommand, RuntimeCommand};
use crate::session::ProtocolSession;

use super::frame::{CoordinateFrame, CoordinateMapper};

// ============================================================================
// Screenshot
// ============================================================================

/// A normalized screenshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Screenshot {
    /// Base64-encoded PNG at canvas size.
    pub data: String,
    /// Geometry used to produce it.
    pub frame: CoordinateFrame,
}

impl Screenshot {
    /// MIME type of [`Screenshot::data`].
    #[inline]
    #[must_use]
    pub fn media_type(&self) -> &'static str {
        "image/png"
    }
}

/// Downscales, letterboxes and resizes a PNG capture.
///
/// # Errors
///
/// Returns [`Error::Image`] if the bytes cannot be decoded or re-encoded.
pub fn normalize(
    png: &[u8],
    device_pixel_ratio: f64,
    canvas_width: u32,
    canvas_height: u32,
) -> Result<Screenshot> {
    let captured = image::load_from_memory(png)?;
    let (width, height) = captured.dimensions();

    let scaled = if device_pixel_ratio.is_finite()
        && device_pixel_ratio > 0.0
        && (device_pixel_ratio - 1.0).abs() > f64::EPSILON
    {
        let w = ((f64::from(width) / device_pixel_ratio).round() as u32).max(1);
        let h = ((f64::from(height) / device_pixel_ratio).round() as u32).max(1);
        captured.resize_exact(w, h, FilterType::Triangle)
    } else {
        captured
    };

    let (width, height) = scaled.dimensions();
    let frame = CoordinateFrame::letterbox(width, height, canvas_width, canvas_height);
    let (padded_width, padded_height) = frame.padded_size(canvas_width, canvas_height);

    let mut padded = RgbaImage::from_pixel(
        padded_width.max(width),
        padded_height.max(height),
        Rgba([0, 0, 0, 255]),
    );
    imageops::overlay(&mut padded, &scaled.to_rgba8(), 0, i64::from(frame.padding_top));

    let resized = imageops::resize(&padded, canvas_width, canvas_height, FilterType::Lanczos3);

    let mut output = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(resized).write_to(&mut output, ImageFormat::Png)?;

    debug!(
        width,
        height,
        padding_top = frame.padding_top,
        scale_x = frame.scale_x,
        "Screenshot normalized"
    );

    Ok(Screenshot {
        data: Base64Standard.encode(output.into_inner()),
        frame,
    })
}

// ============================================================================
// ScreenCapturer
// ============================================================================

/// Captures screenshots through a session and keeps the mapper current.
pub struct ScreenCapturer {
    session: Arc<ProtocolSession>,
    mapper: Arc<CoordinateMapper>,
    options: CaptureOptions,
}

impl ScreenCapturer {
    /// Creates a capturer that installs frames into `mapper`.
    #[must_use]
    pub fn new(
        session: Arc<ProtocolSession>,
        mapper: Arc<CoordinateMapper>,
        options: CaptureOptions,
    ) -> Self {
        Self {
            session,
            mapper,
            options,
        }
    }

    /// Returns the mapper this capturer updates.
    #[inline]
    #[must_use]
    pub fn mapper(&self) -> &Arc<CoordinateMapper> {
        &self.mapper
    }

    /// Captures, normalizes and installs the new frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Screenshot`] if every capture attempt fails
    /// - [`Error::Image`] if the capture cannot be decoded
    pub async fn capture(&self) -> Result<Screenshot> {
        let png = self.capture_png().await?;
        let ratio = self.device_pixel_ratio().await;
        let (canvas_width, canvas_height) = (self.options.canvas_width, self.options.canvas_height);

        let screenshot = tokio::task::spawn_blocking(move || {
            normalize(&png, ratio, canvas_width, canvas_height)
        })
        .await
        .map_err(|e| Error::screenshot(format!("Normalization task failed: {e}")))??;

        self.mapper.replace(screenshot.frame);
        Ok(screenshot)
    }

    async fn capture_png(&self) -> Result<Vec<u8>> {
        let attempts = self.options.attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                sleep(self.options.retry_delay).await;
                debug!(attempt = attempt + 1, attempts, "Retrying screenshot");
            }

            match self.capture_once().await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_target_loss() || matches!(e, Error::SessionClosed) => return Err(e),
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "Screenshot attempt failed");
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string());
        Err(Error::screenshot(format!(
            "Screenshot failed after {attempts} attempts: {reason}"
        )))
    }

    async fn capture_once(&self) -> Result<Vec<u8>> {
        let result = self.session.execute(PageCommand::capture_png()).await?;
        let data = result
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::screenshot("Screenshot response missing data field"))?;
        Ok(Base64Standard.decode(data)?)
    }

    /// Reads `window.devicePixelRatio`, falling back to the configured ratio.
    async fn device_pixel_ratio(&self) -> f64 {
        let fallback = self.options.fallback_device_pixel_ratio;
        match self.session.execute(RuntimeCommand::device_pixel_ratio()).await {
            Ok(value) => value
                .pointer("/result/value")
                .and_then(|v| v.as_f64())
                .filter(|ratio| ratio.is_finite() && *ratio > 0.0)
                .unwrap_or(fallback),
            Err(e) => {
                debug!(error = %e, fallback, "Device pixel ratio unavailable");
                fallback
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

    use serde_json::json;

    use crate::config::SessionOptions;
    use crate::protocol::command::DEVICE_PIXEL_RATIO_EXPRESSION;
    use crate::screen::Point;
    use crate::session::DebuggerBackend;
    use crate::session::mock::MockBackend;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    fn decode(screenshot: &Screenshot) -> DynamicImage {
        let bytes = Base64Standard.decode(&screenshot.data).expect("base64");
        image::load_from_memory(&bytes).expect("png")
    }

    fn capturer_with(backend: &Arc<MockBackend>) -> ScreenCapturer {
        let backend = Arc::clone(backend) as Arc<dyn DebuggerBackend>;
        let session = Arc::new(ProtocolSession::new(backend, SessionOptions::immediate()));
        ScreenCapturer::new(
            session,
            Arc::new(CoordinateMapper::new()),
            CaptureOptions::default().immediate(),
        )
    }

    #[test]
    fn test_normalize_outputs_canvas_size() {
        let shot = normalize(&png(1920, 1080), 1.0, 1024, 768).expect("normalize");
        assert_eq!(decode(&shot).dimensions(), (1024, 768));
        assert_eq!(shot.frame.padding_top, 180);
        assert_eq!(shot.media_type(), "image/png");
    }

    #[test]
    fn test_normalize_applies_device_pixel_ratio() {
        let shot = normalize(&png(2048, 1536), 2.0, 1024, 768).expect("normalize");
        assert_eq!(shot.frame.native_width, 1024);
        assert_eq!(shot.frame.native_height, 768);
        assert!((shot.frame.scale_x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_letterbox_padding_is_black() {
        let shot = normalize(&png(1600, 400), 1.0, 1024, 768).expect("normalize");
        let image = decode(&shot).to_rgba8();
        assert_eq!(image.get_pixel(512, 2).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(512, 384).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(matches!(
            normalize(b"not a png", 1.0, 1024, 768),
            Err(Error::Image(_))
        ));
    }

    #[tokio::test]
    async fn test_capture_installs_frame() {
        let backend = Arc::new(MockBackend::new());
        backend.respond(
            "Page.captureScreenshot",
            json!({ "data": Base64Standard.encode(png(2560, 1440)) }),
        );
        backend.respond_to_expression(
            DEVICE_PIXEL_RATIO_EXPRESSION,
            json!({ "result": { "type": "number", "value": 2.0 } }),
        );
        let capturer = capturer_with(&backend);
        assert!(capturer.mapper().frame().is_none());

        let shot = capturer.capture().await.expect("capture");

        assert_eq!(shot.frame.native_width, 1280);
        assert_eq!(capturer.mapper().frame(), Some(shot.frame));
        let native = capturer
            .mapper()
            .to_native(Point::new(1023.0, 767.0))
            .expect("frame set");
        assert_eq!(native, Point::new(1279.0, 719.0));
    }

    #[tokio::test]
    async fn test_missing_ratio_uses_fallback() {
        let backend = Arc::new(MockBackend::new());
        backend.respond(
            "Page.captureScreenshot",
            json!({ "data": Base64Standard.encode(png(1280, 960)) }),
        );
        let capturer = capturer_with(&backend);

        let shot = capturer.capture().await.expect("capture");
        assert_eq!(shot.frame.native_width, 1024);
        assert_eq!(shot.frame.native_height, 768);
    }

    #[tokio::test]
    async fn test_capture_retries_whole_attempts() {
        let backend = Arc::new(MockBackend::new());
        backend.respond(
            "Page.captureScreenshot",
            json!({ "data": Base64Standard.encode(png(1024, 768)) }),
        );
        // First attempt exhausts its 3 command tries; second attempt recovers
        for _ in 0..4 {
            backend.fail_next(
                "Page.captureScreenshot",
                Error::remote(-32000, "Unable to capture screenshot"),
            );
        }
        let capturer = capturer_with(&backend);

        capturer.capture().await.expect("second attempt succeeds");
        assert_eq!(backend.commands("Page.captureScreenshot").len(), 5);
    }

    #[tokio::test]
    async fn test_capture_gives_up() {
        let backend = Arc::new(MockBackend::new());
        let capturer = capturer_with(&backend);

        // Default mock response has no data field
        let err = capturer.capture().await.expect_err("no data");
        assert!(matches!(err, Error::Screenshot { .. }));
        assert_eq!(backend.commands("Page.captureScreenshot").len(), 5);
        assert!(capturer.mapper().frame().is_none());
    }
}
