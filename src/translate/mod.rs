mod content;
mod generation;
mod response;
mod schema_clean;
mod thinking;

pub use response::translate_response;
pub use schema_clean::clean_json_schema;
pub use thinking::{enable_thinking_for_model, model_is_signature_compatible};

use protogate_schema::gemini::{Content, GenerateContentRequest, Part};
use protogate_schema::{MessageRequest, UpstreamRequestEnvelope};
use protogate_thoughtsig::ThoughtSignatureCache;

use self::content::translate_messages;
use self::generation::{build_generation_config, build_tools};
use self::thinking::{apply_forced_disable_override, apply_thought_signatures, enable_thinking_for_model as enable_thinking};

/// Everything the translator needs beyond the request body itself: the
/// credential-scoped identifiers a selected credential contributes, and the
/// handful of operator-configured defaults.
pub struct TranslationContext<'a> {
    pub project_id: &'a str,
    pub session_id: &'a str,
    pub request_id: &'a str,
    pub user_agent: &'a str,
    pub default_system_instruction: &'a str,
    pub max_images: usize,
    pub default_max_tokens: u32,
    pub default_temperature: f64,
    pub default_top_p: f64,
    pub default_top_k: f64,
}

/// Maps a client-facing chat request into the upstream envelope.
/// Destructive on the tool schemas it cleans (see [`clean_json_schema`]);
/// the client request is only ever read, never mutated.
pub fn translate_request(
    request: &MessageRequest,
    ctx: &TranslationContext,
    cache: &ThoughtSignatureCache,
) -> UpstreamRequestEnvelope {
    let mut turns = translate_messages(&request.messages, ctx.max_images);
    apply_thought_signatures(&mut turns, &request.model, cache);

    let any_thinking_missing_signature = turns
        .iter()
        .filter(|t| t.content.role.as_deref() == Some("model"))
        .any(|t| t.any_thinking_missing_signature);
    let mut contents: Vec<Content> = turns.into_iter().map(|t| t.content).collect();

    let mut thinking_enabled = enable_thinking(&request.model);
    apply_forced_disable_override(&mut thinking_enabled, &mut contents, any_thinking_missing_signature);

    let system_text = request
        .system
        .clone()
        .map(|s| s.into_text())
        .unwrap_or_else(|| ctx.default_system_instruction.to_string());
    let system_instruction = Content {
        role: Some("user".to_string()),
        parts: vec![Part::text(system_text)],
        extra: Default::default(),
    };

    let (tools, tool_config) = build_tools(request.tools.as_deref().unwrap_or(&[]));

    let generation_config = build_generation_config(
        &request.model,
        thinking_enabled,
        request.top_p.or(Some(ctx.default_top_p)),
        request.top_k.or(Some(ctx.default_top_k)),
        request.temperature.or(Some(ctx.default_temperature)),
        request.max_tokens.as_ref(),
        ctx.default_max_tokens,
        request.stop_sequences.clone(),
    );

    let body = GenerateContentRequest {
        contents,
        system_instruction: Some(system_instruction),
        tools: (!tools.is_empty()).then_some(tools),
        tool_config,
        generation_config: Some(generation_config),
        extra: Default::default(),
    };

    UpstreamRequestEnvelope::new(
        ctx.project_id.to_string(),
        ctx.request_id.to_string(),
        request.model.clone(),
        ctx.user_agent.to_string(),
        ctx.session_id.to_string(),
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use protogate_schema::message::{ContentBlock, Message, Role};

    fn ctx() -> TranslationContext<'static> {
        TranslationContext {
            project_id: "proj-1",
            session_id: "sess-1",
            request_id: "req-1",
            user_agent: "protogate-test/1.0",
            default_system_instruction: "You are a helpful assistant.",
            max_images: 16,
            default_max_tokens: 64000,
            default_temperature: 1.0,
            default_top_p: 0.95,
            default_top_k: 64.0,
        }
    }

    fn basic_request(model: &str) -> MessageRequest {
        MessageRequest {
            model: model.to_string(),
            messages: vec![Message {
                role: Role::User,
                content: vec![ContentBlock::Text { text: "hello".into() }],
            }],
            system: None,
            tools: None,
            stop_sequences: None,
            top_p: None,
            top_k: None,
            temperature: None,
            max_tokens: None,
            thinking: None,
            stream: true,
        }
    }

    #[test]
    fn default_system_instruction_used_when_absent() {
        let request = basic_request("gemini-2.5-pro");
        let envelope = translate_request(&request, &ctx(), &ThoughtSignatureCache::new());
        assert_eq!(
            envelope.request.body.system_instruction.unwrap().parts[0].text.as_deref(),
            Some("You are a helpful assistant.")
        );
    }

    #[test]
    fn client_system_replaces_default_entirely() {
        let mut request = basic_request("gemini-2.5-pro");
        request.system = Some(protogate_schema::message::SystemPrompt::Text("custom".into()));
        let envelope = translate_request(&request, &ctx(), &ThoughtSignatureCache::new());
        assert_eq!(
            envelope.request.body.system_instruction.unwrap().parts[0].text.as_deref(),
            Some("custom")
        );
    }

    #[test]
    fn envelope_carries_selected_credential_identifiers() {
        let request = basic_request("gemini-2.5-pro");
        let envelope = translate_request(&request, &ctx(), &ThoughtSignatureCache::new());
        assert_eq!(envelope.project, "proj-1");
        assert_eq!(envelope.request_id, "req-1");
        assert_eq!(envelope.request.session_id, "sess-1");
        assert_eq!(envelope.user_agent, "protogate-test/1.0");
    }
}
