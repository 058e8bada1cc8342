use std::collections::HashMap;

use protogate_schema::gemini::{Content, Part};
use protogate_schema::message::{ContentBlock, ImageSource, Message, Role};
use serde_json::json;
use tracing::warn;

use crate::content_text::render_tool_result_content;

const REDACTED_THINKING_PLACEHOLDER: &str = "[思考内容已隐藏]";

/// One merged output turn, carrying the parts built so far plus the first
/// non-empty client-supplied thought signature seen in its source blocks —
/// needed later by the signature-placement pass, which operates per turn
/// rather than per source message.
///
/// `any_thinking_missing_signature` is computed from the *source* blocks,
/// before placement collapses every signature in the turn down to the one
/// client-supplied signature carried on a single produced part — checking
/// the produced parts afterwards would see every part but one as unsigned
/// even when the client supplied a signature on each of its thinking
/// blocks.
pub struct BuiltTurn {
    pub content: Content,
    pub first_signature: Option<String>,
    pub any_thinking_missing_signature: bool,
}

/// Maps the client message list into upstream `Content` turns: converts
/// each typed block to its `Part` equivalent, merges consecutive
/// same-role messages idempotently, and resolves `functionResponse` names
/// by remembering every `tool_use` id seen so far.
pub fn translate_messages(messages: &[Message], max_images: usize) -> Vec<BuiltTurn> {
    let mut turns: Vec<BuiltTurn> = Vec::new();
    let mut tool_names: HashMap<String, String> = HashMap::new();
    let mut images_seen = 0usize;

    for message in messages {
        let role = match message.role {
            Role::Assistant => "model",
            Role::User => "user",
        };

        let mut parts = Vec::with_capacity(message.content.len());
        let mut first_signature_here: Option<String> = None;
        let mut missing_signature_here = false;

        for block in &message.content {
            if let ContentBlock::ToolUse { id, name, .. } = block {
                tool_names.insert(id.clone(), name.clone());
            }

            let part = match block {
                ContentBlock::Text { text } => Some(Part::text(text.clone())),
                ContentBlock::Image {
                    source: ImageSource::Base64 { media_type, data },
                } => {
                    images_seen += 1;
                    if images_seen > max_images {
                        warn!(max_images, "dropping image: request exceeds image limit");
                        None
                    } else {
                        Some(Part {
                            inline_data: Some(json!({"mimeType": media_type, "data": data})),
                            ..Default::default()
                        })
                    }
                }
                ContentBlock::Image {
                    source: ImageSource::Url { url },
                } => {
                    warn!(url, "dropping image block: URL sources are unsupported upstream");
                    None
                }
                ContentBlock::Thinking { thinking, signature } => {
                    match signature.as_ref().filter(|s| !s.is_empty()) {
                        Some(sig) => {
                            if first_signature_here.is_none() {
                                first_signature_here = Some(sig.clone());
                            }
                        }
                        None => missing_signature_here = true,
                    }
                    Some(Part::thought_text(thinking.clone()))
                }
                ContentBlock::RedactedThinking { .. } => {
                    missing_signature_here = true;
                    Some(Part::thought_text(REDACTED_THINKING_PLACEHOLDER))
                }
                ContentBlock::ToolUse { id, name, input } => Some(Part {
                    function_call: Some(json!({"id": id, "name": name, "args": input})),
                    ..Default::default()
                }),
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => {
                    let stringified = render_tool_result_content(content);
                    let name = tool_names.get(tool_use_id).cloned().unwrap_or_default();
                    let key = if is_error.unwrap_or(false) { "error" } else { "result" };
                    Some(Part {
                        function_response: Some(json!({
                            "id": tool_use_id,
                            "name": name,
                            "response": { key: stringified },
                        })),
                        ..Default::default()
                    })
                }
            };

            if let Some(part) = part {
                parts.push(part);
            }
        }

        match turns.last_mut() {
            Some(prev) if prev.content.role.as_deref() == Some(role) => {
                prev.content.parts.extend(parts);
                if prev.first_signature.is_none() {
                    prev.first_signature = first_signature_here;
                }
                prev.any_thinking_missing_signature |= missing_signature_here;
            }
            _ => {
                turns.push(BuiltTurn {
                    content: Content {
                        role: Some(role.to_string()),
                        parts,
                        extra: Default::default(),
                    },
                    first_signature: first_signature_here,
                    any_thinking_missing_signature: missing_signature_here,
                });
            }
        }
    }

    turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use protogate_schema::message::ContentBlock;

    fn text_message(role: Role, text: &str) -> Message {
        Message {
            role,
            content: vec![ContentBlock::Text { text: text.to_string() }],
        }
    }

    #[test]
    fn consecutive_same_role_messages_merge() {
        let merged = translate_messages(
            &[text_message(Role::User, "a"), text_message(Role::User, "b")],
            16,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].content.parts.len(), 2);
    }

    #[test]
    fn role_merge_is_idempotent_with_pre_merged_input() {
        let separate = translate_messages(
            &[text_message(Role::User, "a"), text_message(Role::User, "b")],
            16,
        );
        let pre_merged = translate_messages(
            &[Message {
                role: Role::User,
                content: vec![
                    ContentBlock::Text { text: "a".into() },
                    ContentBlock::Text { text: "b".into() },
                ],
            }],
            16,
        );
        assert_eq!(separate[0].content.parts, pre_merged[0].content.parts);
    }

    #[test]
    fn tool_result_name_resolved_from_prior_tool_use() {
        let messages = vec![
            Message {
                role: Role::Assistant,
                content: vec![ContentBlock::ToolUse {
                    id: "call_1".into(),
                    name: "get_weather".into(),
                    input: json!({"city": "Berlin"}),
                }],
            },
            Message {
                role: Role::User,
                content: vec![ContentBlock::ToolResult {
                    tool_use_id: "call_1".into(),
                    content: Default::default(),
                    is_error: None,
                }],
            },
        ];
        let turns = translate_messages(&messages, 16);
        let response = &turns[1].content.parts[0].function_response;
        assert_eq!(
            response.as_ref().unwrap().get("name").and_then(|v| v.as_str()),
            Some("get_weather")
        );
    }

    #[test]
    fn unresolved_tool_result_name_is_empty() {
        let messages = vec![Message {
            role: Role::User,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: "unknown".into(),
                content: Default::default(),
                is_error: None,
            }],
        }];
        let turns = translate_messages(&messages, 16);
        let response = &turns[0].content.parts[0].function_response;
        assert_eq!(
            response.as_ref().unwrap().get("name").and_then(|v| v.as_str()),
            Some("")
        );
    }
}
