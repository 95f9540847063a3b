//! Action results returned to the policy.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

use crate::screen::Screenshot;

use super::trajectory::{ContentBlock, ImageSource, ToolResultContent};

// ============================================================================
// ActionResult
// ============================================================================

/// Observation produced by one action, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionResult {
    /// A screenshot.
    Image {
        /// MIME type.
        media_type: String,
        /// Base64 data.
        data: String,
    },
    /// Short text.
    Text {
        /// The text.
        text: String,
    },
}

impl ActionResult {
    /// Text result.
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Returns `true` for image results.
    #[inline]
    #[must_use]
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }

    /// Converts into a tool result body.
    #[must_use]
    pub fn into_content(self) -> ToolResultContent {
        match self {
            Self::Image { media_type, data } => {
                ToolResultContent::Blocks(vec![ContentBlock::Image {
                    source: ImageSource::base64(media_type, data),
                }])
            }
            Self::Text { text } => ToolResultContent::Text(text),
        }
    }
}

impl From<Screenshot> for ActionResult {
    fn from(screenshot: Screenshot) -> Self {
        Self::Image {
            media_type: screenshot.media_type().to_string(),
            data: screenshot.data,
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

    #[test]
    fn test_kind_tag() {
        assert_eq!(
            serde_json::to_value(ActionResult::text("done")).expect("serialize"),
            json!({"kind": "text", "text": "done"})
        );
    }

    #[test]
    fn test_image_into_content() {
        let result = ActionResult::Image {
            media_type: "image/png".to_string(),
            data: "AAAA".to_string(),
        };
        assert!(result.is_image());

        let ToolResultContent::Blocks(blocks) = result.into_content() else {
            panic!("expected blocks");
        };
        assert!(matches!(&blocks[0], ContentBlock::Image { source } if source.data == "AAAA"));
    }
}
