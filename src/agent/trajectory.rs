//! Conversation trajectory in the policy provider's wire shape.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

// ============================================================================
// Constants
// ============================================================================

/// Tool name of computer-use actions.
pub const COMPUTER_TOOL: &str = "computer";

// ============================================================================
// Content
// ============================================================================

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user or environment observations.
    User,
    /// Policy output.
    Assistant,
}

/// Base64 image payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    /// Always `base64`.
    #[serde(rename = "type")]
    pub kind: String,
    /// MIME type.
    pub media_type: String,
    /// Base64 data.
    pub data: String,
}

impl ImageSource {
    /// Base64 source with the given MIME type.
    #[must_use]
    pub fn base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind: "base64".to_string(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }
}

/// Body of a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    /// Plain text.
    Text(String),
    /// Structured blocks (images).
    Blocks(Vec<ContentBlock>),
}

/// One content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Free text.
    Text {
        /// The text.
        text: String,
    },
    /// Tool invocation requested by the policy.
    ToolUse {
        /// Invocation id.
        id: String,
        /// Tool name.
        name: String,
        /// Tool input.
        input: Value,
    },
    /// Observation answering a tool invocation.
    ToolResult {
        /// Id of the invocation answered.
        tool_use_id: String,
        /// Result body.
        content: ToolResultContent,
        /// Marks a failed invocation.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Inline image.
    Image {
        /// Image payload.
        source: ImageSource,
    },
}

impl ContentBlock {
    /// Text block.
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Tool-use block.
    #[must_use]
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    fn is_computer_call(&self) -> bool {
        matches!(self, Self::ToolUse { name, .. } if name == COMPUTER_TOOL)
    }
}

/// One trajectory message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author.
    pub role: Role,
    /// Content blocks.
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// User text message.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Assistant message.
    #[must_use]
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// User message carrying one tool result.
    #[must_use]
    pub fn tool_result(tool_use_id: impl Into<String>, content: ToolResultContent, is_error: bool) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content,
                is_error,
            }],
        }
    }
}

// ============================================================================
// Trajectory
// ============================================================================

/// Ordered conversation history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    messages: Vec<Message>,
}

impl Trajectory {
    /// Empty trajectory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message.
    pub fn append(&mut self, message: Message) {
        debug!(role = ?message.role, blocks = message.content.len(), "Trajectory append");
        self.messages.push(message);
    }

    /// All messages in order.
    #[inline]
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if there are no messages.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drops every message.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// Removes an unanswered action from the end of the trajectory.
    ///
    /// Drops `computer` tool-use blocks from a trailing assistant message,
    /// and the message itself if nothing is left. Other trailing messages
    /// are untouched.
    pub fn cleanup_last_action(&mut self) {
        let Some(last) = self.messages.last_mut() else {
            return;
        };
        if last.role != Role::Assistant {
            return;
        }

        let before = last.content.len();
        last.content.retain(|block| !block.is_computer_call());
        debug!(removed = before - last.content.len(), "Cleaned up last action");

        if last.content.is_empty() {
            self.messages.pop();
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

    fn computer_call() -> ContentBlock {
        ContentBlock::tool_use("toolu_1", COMPUTER_TOOL, json!({"action": "screenshot"}))
    }

    #[test]
    fn test_wire_shape() {
        let message = Message::tool_result(
            "toolu_1",
            ToolResultContent::Blocks(vec![ContentBlock::Image {
                source: ImageSource::base64("image/png", "AAAA"),
            }]),
            false,
        );

        assert_eq!(
            serde_json::to_value(&message).expect("serialize"),
            json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": "toolu_1",
                    "content": [{
                        "type": "image",
                        "source": {"type": "base64", "media_type": "image/png", "data": "AAAA"}
                    }]
                }]
            })
        );
    }

    #[test]
    fn test_error_results_are_flagged() {
        let message = Message::tool_result("t", ToolResultContent::Text("bad".to_string()), true);
        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(value["content"][0]["is_error"], true);
        assert_eq!(value["content"][0]["content"], "bad");
    }

    #[test]
    fn test_parse_policy_blocks() {
        let blocks: Vec<ContentBlock> = serde_json::from_value(json!([
            {"type": "text", "text": "Clicking"},
            {"type": "tool_use", "id": "toolu_9", "name": "computer", "input": {"action": "left_click"}}
        ]))
        .expect("deserialize");

        assert_eq!(blocks[0], ContentBlock::text("Clicking"));
        assert!(blocks[1].is_computer_call());
    }

    #[test]
    fn test_cleanup_removes_computer_blocks() {
        let mut trajectory = Trajectory::new();
        trajectory.append(Message::user_text("go"));
        trajectory.append(Message::assistant(vec![ContentBlock::text("thinking"), computer_call()]));

        trajectory.cleanup_last_action();

        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory.messages()[1].content, vec![ContentBlock::text("thinking")]);
    }

    #[test]
    fn test_cleanup_drops_emptied_message() {
        let mut trajectory = Trajectory::new();
        trajectory.append(Message::user_text("go"));
        trajectory.append(Message::assistant(vec![computer_call()]));

        trajectory.cleanup_last_action();
        assert_eq!(trajectory.len(), 1);
    }

    #[test]
    fn test_cleanup_ignores_user_tail() {
        let mut trajectory = Trajectory::new();
        trajectory.cleanup_last_action();
        assert!(trajectory.is_empty());

        trajectory.append(Message::user_text("go"));
        trajectory.cleanup_last_action();
        assert_eq!(trajectory.len(), 1);

        trajectory.reset();
        assert!(trajectory.is_empty());
    }
}
