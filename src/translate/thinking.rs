use protogate_schema::gemini::{Content, Part};
use protogate_thoughtsig::ThoughtSignatureCache;

use super::content::BuiltTurn;

/// Models whose name is treated as belonging to the reasoning-capable
/// "gemini-3" family: thought-signature placement only runs for these, and
/// `thoughtSignature` is stripped for everyone else. Matches the grouping
/// in [`crate::config::MODEL_GROUPS`].
const GEMINI_3_MARKER: &str = "gemini-3";

/// Models enumerated as reasoning-capable for the purposes of
/// `generationConfig.thinkingConfig`, independent of the gemini-3 marker
/// check above (e.g. Claude-family targets opt into the thinking config
/// block but never carry a thought signature).
const ENUMERATED_REASONING_MODELS: &[&str] = &[
    "gemini-3-pro-preview",
    "gemini-3-pro-high",
    "gemini-3-pro-low",
    "gemini-3-flash",
];

pub fn model_is_signature_compatible(model: &str) -> bool {
    model.contains(GEMINI_3_MARKER)
}

/// `enableThinking` eligibility: ends in `-thinking`, is one of the
/// enumerated reasoning models, or the model name mentions `claude`.
pub fn enable_thinking_for_model(model: &str) -> bool {
    model.ends_with("-thinking")
        || ENUMERATED_REASONING_MODELS.contains(&model)
        || model.contains("claude")
}

enum SignatureTarget {
    FunctionCall(String),
    Thought(String),
    Text,
}

/// Attaches each turn's thought signature to exactly one produced part, in
/// strict priority order, or strips any stray `thoughtSignature` entirely
/// when the target model doesn't belong to the signature-compatible family.
///
/// The signature itself comes from the turn's own client-supplied
/// `thinking` blocks when present; otherwise the thought-signature cache
/// is consulted — by the turn's `functionCall` id, then by its thought
/// text — so a signature learned from an earlier response can still be
/// replayed when the client doesn't echo it back directly. Either way,
/// whatever gets attached is written back into the cache so future turns
/// can recover it the same way.
pub fn apply_thought_signatures(turns: &mut [BuiltTurn], model: &str, cache: &ThoughtSignatureCache) {
    let compatible = model_is_signature_compatible(model);
    for turn in turns.iter_mut() {
        if turn.content.role.as_deref() != Some("model") {
            continue;
        }
        if !compatible {
            for part in &mut turn.content.parts {
                part.thought_signature = None;
            }
            continue;
        }

        let mut signature = turn.first_signature.clone();
        if signature.is_none() {
            if let Some(id) = first_function_call_id(&turn.content.parts) {
                signature = cache.get_for_tool_call(&id).map(|s| s.to_string());
            }
        }
        if signature.is_none() {
            if let Some(text) = last_thought_text(&turn.content.parts) {
                signature = cache.get_for_text(&text).map(|hit| hit.signature.to_string());
            }
        }

        let Some(signature) = signature else { continue };
        if let Some(target) = attach_signature(&mut turn.content.parts, &signature) {
            match target {
                SignatureTarget::FunctionCall(id) => cache.put_for_tool_call(id, signature),
                SignatureTarget::Thought(text) => cache.put_for_text(&text, signature),
                SignatureTarget::Text => {}
            }
        }
    }
}

fn first_function_call_id(parts: &[Part]) -> Option<String> {
    parts
        .iter()
        .find(|p| p.is_function_call())
        .and_then(|p| p.function_call.as_ref())
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .map(String::from)
}

fn last_thought_text(parts: &[Part]) -> Option<String> {
    parts.iter().rev().find(|p| p.is_thought()).and_then(|p| p.text.clone())
}

fn attach_signature(parts: &mut [Part], signature: &str) -> Option<SignatureTarget> {
    if let Some(part) = parts.iter_mut().find(|p| p.is_function_call()) {
        part.thought_signature = Some(signature.to_string());
        let id = part
            .function_call
            .as_ref()
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_str())
            .map(String::from);
        return Some(id.map(SignatureTarget::FunctionCall).unwrap_or(SignatureTarget::Text));
    }
    if let Some(part) = parts
        .iter_mut()
        .rev()
        .find(|p| !p.is_thought() && p.text.is_some())
    {
        part.thought_signature = Some(signature.to_string());
        return Some(SignatureTarget::Text);
    }
    if let Some(part) = parts.iter_mut().rev().find(|p| p.is_thought()) {
        part.thought_signature = Some(signature.to_string());
        return part.text.clone().map(SignatureTarget::Thought);
    }
    None
}

/// Forced-disable override: if any historical assistant thinking
/// block lacks a signature, or the last assistant turn has no thought
/// parts, thinking is forcibly disabled for this call. Otherwise, if the
/// last assistant turn's thoughts aren't already first, its parts are
/// reordered so every thought precedes every non-thought — the layout the
/// upstream requires for continuation.
///
/// `any_thinking_missing_signature` must be computed from the *source*
/// client blocks (see [`BuiltTurn`]), not the parts produced after
/// signature placement: placement collapses every signature in a turn down
/// to one carried part, so scanning produced parts would see every other
/// thought part as unsigned even when the client signed each one.
pub fn apply_forced_disable_override(
    enabled: &mut bool,
    contents: &mut [Content],
    any_thinking_missing_signature: bool,
) {
    if !*enabled {
        return;
    }

    if any_thinking_missing_signature {
        *enabled = false;
        return;
    }

    let Some(last_model_idx) = contents.iter().rposition(|c| c.role.as_deref() == Some("model"))
    else {
        return;
    };

    let parts = &mut contents[last_model_idx].parts;
    if !parts.iter().any(|p| p.is_thought()) {
        *enabled = false;
        return;
    }
    if !parts.first().is_some_and(|p| p.is_thought()) {
        parts.sort_by_key(|p| !p.is_thought());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::content::translate_messages;
    use protogate_schema::message::{ContentBlock, Message, Role};

    fn cache() -> ThoughtSignatureCache {
        ThoughtSignatureCache::new()
    }

    #[test]
    fn signature_goes_on_trailing_text_part() {
        let messages = vec![Message {
            role: Role::Assistant,
            content: vec![
                ContentBlock::Thinking {
                    thinking: "t1".into(),
                    signature: Some("S".into()),
                },
                ContentBlock::Text { text: "hi".into() },
            ],
        }];
        let mut turns = translate_messages(&messages, 16);
        apply_thought_signatures(&mut turns, "gemini-3-pro-preview", &cache());

        let parts = &turns[0].content.parts;
        assert_eq!(parts[0].text.as_deref(), Some("t1"));
        assert!(parts[0].is_thought());
        assert!(parts[0].thought_signature.is_none());
        assert_eq!(parts[1].text.as_deref(), Some("hi"));
        assert_eq!(parts[1].thought_signature.as_deref(), Some("S"));
    }

    #[test]
    fn non_compatible_model_strips_signature() {
        let messages = vec![Message {
            role: Role::Assistant,
            content: vec![ContentBlock::Thinking {
                thinking: "t1".into(),
                signature: Some("S".into()),
            }],
        }];
        let mut turns = translate_messages(&messages, 16);
        turns[0].content.parts[0].thought_signature = Some("stale".into());
        apply_thought_signatures(&mut turns, "claude-3-5-sonnet", &cache());
        assert!(turns[0].content.parts[0].thought_signature.is_none());
    }

    #[test]
    fn missing_client_signature_falls_back_to_cache_by_text() {
        let cache = cache();
        cache.put_for_text("reasoning", "cached-sig");
        let messages = vec![Message {
            role: Role::Assistant,
            content: vec![ContentBlock::Thinking {
                thinking: "reasoning".into(),
                signature: None,
            }],
        }];
        let mut turns = translate_messages(&messages, 16);
        apply_thought_signatures(&mut turns, "gemini-3-pro-preview", &cache);
        assert_eq!(
            turns[0].content.parts[0].thought_signature.as_deref(),
            Some("cached-sig")
        );
    }

    #[test]
    fn missing_signature_anywhere_forces_disable() {
        let mut enabled = true;
        let mut contents = vec![Content {
            role: Some("model".into()),
            parts: vec![Part::thought_text("unsigned")],
            extra: Default::default(),
        }];
        apply_forced_disable_override(&mut enabled, &mut contents, true);
        assert!(!enabled);
    }

    #[test]
    fn last_turn_without_thoughts_forces_disable() {
        let mut enabled = true;
        let mut contents = vec![Content {
            role: Some("model".into()),
            parts: vec![Part::text("plain")],
            extra: Default::default(),
        }];
        apply_forced_disable_override(&mut enabled, &mut contents, false);
        assert!(!enabled);
    }

    #[test]
    fn thoughts_not_first_get_reordered() {
        let mut enabled = true;
        let mut signed_thought = Part::thought_text("reasoning");
        signed_thought.thought_signature = Some("sig".into());
        let mut contents = vec![Content {
            role: Some("model".into()),
            parts: vec![Part::text("answer"), signed_thought],
            extra: Default::default(),
        }];
        apply_forced_disable_override(&mut enabled, &mut contents, false);
        assert!(enabled);
        assert!(contents[0].parts[0].is_thought());
        assert!(!contents[0].parts[1].is_thought());
    }

    #[test]
    fn multiple_signed_thoughts_in_one_turn_do_not_force_disable() {
        // Every client thinking block in this turn carries its own
        // signature; placement only keeps one on the produced parts, but
        // that collapse must not be mistaken for a missing signature.
        let mut enabled = true;
        let mut contents = vec![Content {
            role: Some("model".into()),
            parts: vec![Part::thought_text("first"), Part::thought_text("second")],
            extra: Default::default(),
        }];
        apply_forced_disable_override(&mut enabled, &mut contents, false);
        assert!(enabled);
    }
}
