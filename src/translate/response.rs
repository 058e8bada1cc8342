use protogate_schema::gemini::{GenerateContentResponse, Part};
use protogate_schema::message::{ContentBlock, MessageResponse, Usage};
use serde_json::Value;

/// Maps one upstream part to its client-facing block, or `None` for parts
/// with no client-facing representation (e.g. an empty placeholder part).
fn part_to_block(part: &Part) -> Option<ContentBlock> {
    if part.is_function_call() {
        let call = part.function_call.as_ref()?;
        let id = call.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let name = call.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let input = call.get("args").cloned().unwrap_or(Value::Object(Default::default()));
        return Some(ContentBlock::ToolUse { id, name, input });
    }
    let text = part.text.clone()?;
    if part.is_thought() {
        Some(ContentBlock::Thinking {
            thinking: text,
            signature: part.thought_signature.clone(),
        })
    } else {
        Some(ContentBlock::Text { text })
    }
}

/// Gemini's `finishReason` to the client schema's `stop_reason`. A
/// `functionCall` anywhere in the candidate overrides the upstream's own
/// reason, matching how the streaming path always reports `tool_use` turns
/// that way regardless of what the model itself claimed.
fn stop_reason(finish_reason: Option<&str>, content: &[ContentBlock]) -> Option<String> {
    if content.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. })) {
        return Some("tool_use".to_string());
    }
    match finish_reason {
        Some("MAX_TOKENS") => Some("max_tokens".to_string()),
        Some("STOP") | Some("OTHER") | Some("SAFETY") | Some("RECITATION") | None => {
            Some("end_turn".to_string())
        }
        Some(_) => Some("end_turn".to_string()),
    }
}

/// Builds the single JSON reply from a `generateContent` response
/// (the non-streaming path). `input_tokens` comes from the request-side
/// estimate since Gemini's own `promptTokenCount` isn't always reliable for
/// requests carrying a synthesized system instruction.
pub fn translate_response(
    response: &GenerateContentResponse,
    request_id: &str,
    model: &str,
    input_tokens: u32,
) -> MessageResponse {
    let candidate = response.candidates.first();
    let content: Vec<ContentBlock> = candidate
        .map(|c| c.content.parts.iter().filter_map(part_to_block).collect())
        .unwrap_or_default();

    let output_tokens = response
        .usage_metadata
        .map(|u| u.candidates_token_count)
        .unwrap_or(0);

    MessageResponse {
        id: format!("msg_{request_id}"),
        kind: "message".to_string(),
        role: "assistant".to_string(),
        model: model.to_string(),
        stop_reason: stop_reason(candidate.and_then(|c| c.finish_reason.as_deref()), &content),
        stop_sequence: None,
        content,
        usage: Usage {
            input_tokens,
            output_tokens,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protogate_schema::gemini::{Candidate, Content};
    use serde_json::json;

    #[test]
    fn text_only_reply_maps_to_end_turn() {
        let response = GenerateContentResponse {
            candidates: vec![Candidate {
                content: Content {
                    role: Some("model".into()),
                    parts: vec![Part::text("hi")],
                    extra: Default::default(),
                },
                finish_reason: Some("STOP".to_string()),
                extra: Default::default(),
            }],
            usage_metadata: None,
            extra: Default::default(),
        };
        let mapped = translate_response(&response, "req-1", "gemini-2.5-pro", 10);
        assert_eq!(mapped.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(mapped.content, vec![ContentBlock::Text { text: "hi".into() }]);
    }

    #[test]
    fn tool_call_reply_overrides_stop_reason() {
        let mut call_part = Part::default();
        call_part.function_call = Some(json!({"id": "t1", "name": "f", "args": {"x": 1}}));
        let response = GenerateContentResponse {
            candidates: vec![Candidate {
                content: Content {
                    role: Some("model".into()),
                    parts: vec![call_part],
                    extra: Default::default(),
                },
                finish_reason: Some("STOP".to_string()),
                extra: Default::default(),
            }],
            usage_metadata: None,
            extra: Default::default(),
        };
        let mapped = translate_response(&response, "req-1", "gemini-3-pro-preview", 5);
        assert_eq!(mapped.stop_reason.as_deref(), Some("tool_use"));
        assert!(matches!(mapped.content[0], ContentBlock::ToolUse { .. }));
    }

    #[test]
    fn max_tokens_finish_reason_maps_through() {
        let response = GenerateContentResponse {
            candidates: vec![Candidate {
                content: Content {
                    role: Some("model".into()),
                    parts: vec![Part::text("cut off")],
                    extra: Default::default(),
                },
                finish_reason: Some("MAX_TOKENS".to_string()),
                extra: Default::default(),
            }],
            usage_metadata: None,
            extra: Default::default(),
        };
        let mapped = translate_response(&response, "req-1", "gemini-2.5-pro", 1);
        assert_eq!(mapped.stop_reason.as_deref(), Some("max_tokens"));
    }
}
