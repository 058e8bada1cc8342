use super::content_block::ContentBlock;
use super::response::Usage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level SSE event names emitted by the stream emitter (C6), in the
/// order a single response produces them: one `message_start`, interleaved
/// `content_block_start`/`content_block_delta`/`content_block_stop` per
/// block, then `message_delta` and `message_stop`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageStreamEvent {
    MessageStart { message: MessageStartPayload },
    ContentBlockStart { index: usize, content_block: StartBlock },
    ContentBlockDelta { index: usize, delta: ContentBlockDelta },
    ContentBlockStop { index: usize },
    MessageDelta { delta: MessageDelta, usage: Usage },
    MessageStop,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageStartPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub role: &'static str,
    pub model: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<StopReason>,
    pub usage: Usage,
}

/// The empty-bodied block opened by `content_block_start`; its content is
/// filled in by subsequent deltas, matching the vendor wire format where
/// `text`/`thinking` start empty and `tool_use` starts with an empty
/// `input: {}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StartBlock {
    Text { text: &'static str },
    Thinking { thinking: &'static str },
    ToolUse { id: String, name: String, input: Value },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageDelta {
    pub stop_reason: Option<StopReason>,
    pub stop_sequence: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
}

impl MessageStreamEvent {
    /// The SSE `event:` line name axum's `Event::event()` expects, mirroring
    /// the vendor protocol's convention of repeating the payload's `type` as
    /// the frame's event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            MessageStreamEvent::MessageStart { .. } => "message_start",
            MessageStreamEvent::ContentBlockStart { .. } => "content_block_start",
            MessageStreamEvent::ContentBlockDelta { .. } => "content_block_delta",
            MessageStreamEvent::ContentBlockStop { .. } => "content_block_stop",
            MessageStreamEvent::MessageDelta { .. } => "message_delta",
            MessageStreamEvent::MessageStop => "message_stop",
        }
    }
}
