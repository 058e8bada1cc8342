use protogate_schema::message::{
    ContentBlockDelta, MessageDelta, MessageStartPayload, MessageStreamEvent, StartBlock, StopReason,
    Usage,
};
use serde_json::json;

use crate::tokens::estimate;

/// A complete upstream tool call, already assembled from its (typically
/// single-shot, non-incremental) `functionCall` part.
#[derive(Debug, Clone)]
pub struct ToolCallDelta {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Final usage figures from the upstream's terminal chunk. `output_tokens`
/// is optional because some callers only learn `input_tokens` up front and
/// rely on the emitter's own running estimate for the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinishUsage {
    pub input_tokens: u32,
    pub output_tokens: Option<u32>,
}

/// Converts upstream model deltas into the client's content-block SSE
/// protocol, preserving open/close discipline: at most one text and one
/// thinking block open at a time, tool-use blocks never overlap anything,
/// and every opened block is matched by exactly one stop.
pub struct StreamEmitter {
    request_id: String,
    model: String,
    next_index: usize,
    text_block_index: Option<usize>,
    thinking_block_index: Option<usize>,
    total_output_tokens: u32,
    finished: bool,
}

impl StreamEmitter {
    pub fn new(request_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            model: model.into(),
            next_index: 0,
            text_block_index: None,
            thinking_block_index: None,
            total_output_tokens: 0,
            finished: false,
        }
    }

    pub fn start(&self, input_tokens: u32) -> MessageStreamEvent {
        MessageStreamEvent::MessageStart {
            message: MessageStartPayload {
                id: format!("msg_{}", self.request_id),
                kind: "message",
                role: "assistant",
                model: self.model.clone(),
                content: Vec::new(),
                stop_reason: None,
                usage: Usage {
                    input_tokens,
                    output_tokens: 0,
                },
            },
        }
    }

    /// Closes any open thinking block, opens a text block if none is open,
    /// and emits a `text_delta`.
    pub fn send_text(&mut self, chunk: &str) -> Vec<MessageStreamEvent> {
        let mut events = Vec::new();
        if let Some(idx) = self.thinking_block_index.take() {
            events.push(MessageStreamEvent::ContentBlockStop { index: idx });
        }
        let idx = *self.text_block_index.get_or_insert_with(|| {
            let idx = self.next_index;
            self.next_index += 1;
            events.push(MessageStreamEvent::ContentBlockStart {
                index: idx,
                content_block: StartBlock::Text { text: "" },
            });
            idx
        });
        self.total_output_tokens += estimate(chunk);
        events.push(MessageStreamEvent::ContentBlockDelta {
            index: idx,
            delta: ContentBlockDelta::TextDelta { text: chunk.to_string() },
        });
        events
    }

    /// Symmetric with `send_text`: closes any open text block first.
    pub fn send_thinking(&mut self, chunk: &str) -> Vec<MessageStreamEvent> {
        let mut events = Vec::new();
        if let Some(idx) = self.text_block_index.take() {
            events.push(MessageStreamEvent::ContentBlockStop { index: idx });
        }
        let idx = *self.thinking_block_index.get_or_insert_with(|| {
            let idx = self.next_index;
            self.next_index += 1;
            events.push(MessageStreamEvent::ContentBlockStart {
                index: idx,
                content_block: StartBlock::Thinking { thinking: "" },
            });
            idx
        });
        self.total_output_tokens += estimate(chunk);
        events.push(MessageStreamEvent::ContentBlockDelta {
            index: idx,
            delta: ContentBlockDelta::ThinkingDelta {
                thinking: chunk.to_string(),
            },
        });
        events
    }

    /// Closes both open blocks, then opens, deltas, and immediately closes
    /// a fresh `tool_use` block per call — each occupies its own index and
    /// never overlaps another block.
    pub fn send_tool_calls(&mut self, calls: &[ToolCallDelta]) -> Vec<MessageStreamEvent> {
        let mut events = Vec::new();
        if let Some(idx) = self.text_block_index.take() {
            events.push(MessageStreamEvent::ContentBlockStop { index: idx });
        }
        if let Some(idx) = self.thinking_block_index.take() {
            events.push(MessageStreamEvent::ContentBlockStop { index: idx });
        }
        for call in calls {
            let idx = self.next_index;
            self.next_index += 1;
            events.push(MessageStreamEvent::ContentBlockStart {
                index: idx,
                content_block: StartBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: json!({}),
                },
            });
            self.total_output_tokens += estimate(&call.arguments);
            events.push(MessageStreamEvent::ContentBlockDelta {
                index: idx,
                delta: ContentBlockDelta::InputJsonDelta {
                    partial_json: call.arguments.clone(),
                },
            });
            events.push(MessageStreamEvent::ContentBlockStop { index: idx });
        }
        events
    }

    /// Closes any still-open blocks and emits `message_delta`/`message_stop`.
    /// Idempotent: a second call after `finished` is set returns no events.
    pub fn finish(&mut self, usage: FinishUsage) -> Vec<MessageStreamEvent> {
        if self.finished {
            return Vec::new();
        }
        let mut events = Vec::new();
        if let Some(idx) = self.text_block_index.take() {
            events.push(MessageStreamEvent::ContentBlockStop { index: idx });
        }
        if let Some(idx) = self.thinking_block_index.take() {
            events.push(MessageStreamEvent::ContentBlockStop { index: idx });
        }
        events.push(MessageStreamEvent::MessageDelta {
            delta: MessageDelta {
                stop_reason: Some(StopReason::EndTurn),
                stop_sequence: None,
            },
            usage: Usage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens.unwrap_or(self.total_output_tokens),
            },
        });
        events.push(MessageStreamEvent::MessageStop);
        self.finished = true;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_name(event: &MessageStreamEvent) -> &'static str {
        event.event_name()
    }

    #[test]
    fn stream_emitter_sequences_thinking_text_and_tool_calls() {
        let mut emitter = StreamEmitter::new("req-1", "gemini-3-pro-preview");
        let mut events = vec![emitter.start(10)];
        events.extend(emitter.send_thinking("a"));
        events.extend(emitter.send_text("b"));
        events.extend(emitter.send_tool_calls(&[ToolCallDelta {
            id: "t1".into(),
            name: "f".into(),
            arguments: "{}".into(),
        }]));
        events.extend(emitter.finish(FinishUsage {
            input_tokens: 10,
            output_tokens: Some(3),
        }));

        let names: Vec<&str> = events.iter().map(event_name).collect();
        assert_eq!(
            names,
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );

        match &events[1] {
            MessageStreamEvent::ContentBlockStart { index, content_block: StartBlock::Thinking { .. } } => {
                assert_eq!(*index, 0)
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match &events[4] {
            MessageStreamEvent::ContentBlockStart { index, content_block: StartBlock::Text { .. } } => {
                assert_eq!(*index, 1)
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match &events[7] {
            MessageStreamEvent::ContentBlockStart { index, content_block: StartBlock::ToolUse { .. } } => {
                assert_eq!(*index, 2)
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match &events[10] {
            MessageStreamEvent::MessageDelta { usage, .. } => {
                assert_eq!(usage.input_tokens, 10);
                assert_eq!(usage.output_tokens, 3);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn every_start_has_exactly_one_matching_stop() {
        let mut emitter = StreamEmitter::new("req-1", "m");
        let mut events = vec![emitter.start(1)];
        events.extend(emitter.send_text("a"));
        events.extend(emitter.send_thinking("b"));
        events.extend(emitter.send_text("c"));
        events.extend(emitter.finish(FinishUsage::default()));

        let mut opened = std::collections::HashSet::new();
        let mut closed = std::collections::HashSet::new();
        for event in &events {
            match event {
                MessageStreamEvent::ContentBlockStart { index, .. } => {
                    assert!(opened.insert(*index), "block {index} started twice");
                }
                MessageStreamEvent::ContentBlockStop { index } => {
                    assert!(closed.insert(*index), "block {index} stopped twice");
                }
                _ => {}
            }
        }
        assert_eq!(opened, closed);
    }

    #[test]
    fn text_and_thinking_never_open_simultaneously() {
        let mut emitter = StreamEmitter::new("req-1", "m");
        emitter.send_text("a");
        assert!(emitter.text_block_index.is_some());
        emitter.send_thinking("b");
        assert!(emitter.thinking_block_index.is_some());
        assert!(emitter.text_block_index.is_none());
    }

    #[test]
    fn finish_is_idempotent() {
        let mut emitter = StreamEmitter::new("req-1", "m");
        emitter.send_text("a");
        let first = emitter.finish(FinishUsage::default());
        assert!(!first.is_empty());
        let second = emitter.finish(FinishUsage::default());
        assert!(second.is_empty());
    }
}
