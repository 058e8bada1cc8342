use protogate_schema::{ContentBlock, MessageRequest};

/// Character-based approximate token count. Deliberately crude — this
/// trades precision for having no model-specific tokenizer dependency
/// at all, since token-accurate billing isn't a goal here.
pub fn estimate(text: &str) -> u32 {
    let len = text.chars().count();
    ((len as f64 / 4.0).ceil() as u32).max(1)
}

/// Flattens a request's messages, system prompt, and tool declarations to
/// plain text for `estimate`, giving the `input_tokens` figure reported in
/// usage blocks. Tool calls and tool results are rendered as tagged
/// fragments so their JSON payload still contributes to the count; inline
/// image bytes are not (no textual content to approximate).
pub fn estimate_request_input_tokens(request: &MessageRequest) -> u32 {
    let mut rendered = String::new();

    if let Some(system) = &request.system {
        rendered.push_str(&system.clone().into_text());
        rendered.push('\n');
    }

    for message in &request.messages {
        for block in &message.content {
            render_block(block, &mut rendered);
            rendered.push('\n');
        }
    }

    if let Some(tools) = &request.tools {
        if let Ok(json) = serde_json::to_string(tools) {
            rendered.push_str(&json);
        }
    }

    estimate(&rendered)
}

fn render_block(block: &ContentBlock, out: &mut String) {
    match block {
        ContentBlock::Text { text } => out.push_str(text),
        ContentBlock::Thinking { thinking, .. } => out.push_str(thinking),
        ContentBlock::RedactedThinking { data } => out.push_str(data),
        ContentBlock::Image { .. } => {}
        ContentBlock::ToolUse { id, name, input } => {
            let args = serde_json::to_string(input).unwrap_or_default();
            out.push_str(&format!("<invoke name=\"{name}\">{args}</invoke>"));
            let _ = id;
        }
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            ..
        } => {
            let rendered = crate::content_text::render_tool_result_content(content);
            out.push_str(&format!(
                "<tool_result id=\"{tool_use_id}\">{rendered}</tool_result>"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_rounds_up_and_floors_at_one() {
        assert_eq!(estimate(""), 1);
        assert_eq!(estimate("abcd"), 1);
        assert_eq!(estimate("abcde"), 2);
        assert_eq!(estimate(&"a".repeat(400)), 100);
    }
}
