use protogate_schema::gemini::{FunctionDeclaration, GenerationConfig, Tool, ToolConfig};
use protogate_schema::message::ToolDefinition;
use serde_json::{json, Value};

use super::schema_clean::clean_json_schema;

/// Default `stopSequences` used when the client omits them, matching the
/// upstream's own turn-delimiter tokens so a runaway completion can't
/// bleed past a synthetic conversation boundary.
pub const DEFAULT_STOP_SEQUENCES: &[&str] = &[
    "<|user|>",
    "<|bot|>",
    "<|context_request|>",
    "<|endoftext|>",
    "<|end_of_turn|>",
];

/// Builds `generationConfig`. `max_tokens` accepts the client's raw JSON
/// value so a non-numeric value (string, object, absent) falls back to
/// `default_max_tokens` exactly like a missing field. `top_p` is omitted
/// entirely for Claude-family targets once thinking is enabled, since the
/// upstream rejects the combination for that family.
#[allow(clippy::too_many_arguments)]
pub fn build_generation_config(
    model: &str,
    thinking_enabled: bool,
    top_p: Option<f64>,
    top_k: Option<f64>,
    temperature: Option<f64>,
    max_tokens: Option<&Value>,
    default_max_tokens: u32,
    stop_sequences: Option<Vec<String>>,
) -> GenerationConfig {
    let max_output_tokens = max_tokens
        .and_then(|v| v.as_u64())
        .map(|v| v as u32)
        .unwrap_or(default_max_tokens);

    let is_claude_target = model.contains("claude");
    let top_p = if is_claude_target && thinking_enabled {
        None
    } else {
        top_p
    };

    let thinking_config = Some(json!({
        "includeThoughts": thinking_enabled,
        "thinkingBudget": if thinking_enabled { 1024 } else { 0 },
    }));

    GenerationConfig {
        temperature,
        top_p,
        top_k,
        candidate_count: Some(1),
        max_output_tokens: Some(max_output_tokens),
        stop_sequences: Some(stop_sequences.unwrap_or_else(|| {
            DEFAULT_STOP_SEQUENCES.iter().map(|s| s.to_string()).collect()
        })),
        thinking_config,
        extra: Default::default(),
    }
}

/// Cleans each tool's `input_schema` (destructively — callers needing the
/// original must clone first) and wraps it as a `functionDeclarations`
/// entry. Returns the tools array plus a `toolConfig` forcing validated
/// function calling whenever at least one tool is present.
pub fn build_tools(tools: &[ToolDefinition]) -> (Vec<Tool>, Option<ToolConfig>) {
    if tools.is_empty() {
        return (Vec::new(), None);
    }

    let declarations = tools
        .iter()
        .map(|tool| {
            let mut schema = tool.input_schema.clone();
            clean_json_schema(&mut schema);
            FunctionDeclaration {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: Some(schema),
                extra: Default::default(),
            }
        })
        .collect();

    let tool_config = ToolConfig {
        function_calling_config: Some(json!({"mode": "VALIDATED"})),
        extra: Default::default(),
    };

    (
        vec![Tool {
            function_declarations: Some(declarations),
            extra: Default::default(),
        }],
        Some(tool_config),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_numeric_max_tokens_falls_back_to_default() {
        let cfg = build_generation_config(
            "gemini-3-pro-preview",
            false,
            Some(0.9),
            Some(40.0),
            Some(0.7),
            Some(&Value::String("lots".into())),
            64000,
            None,
        );
        assert_eq!(cfg.max_output_tokens, Some(64000));
    }

    #[test]
    fn claude_target_with_thinking_drops_top_p() {
        let cfg = build_generation_config(
            "claude-sonnet-4", true, Some(0.9), None, None, None, 64000, None,
        );
        assert!(cfg.top_p.is_none());
    }

    #[test]
    fn claude_target_without_thinking_keeps_top_p() {
        let cfg = build_generation_config(
            "claude-sonnet-4", false, Some(0.9), None, None, None, 64000, None,
        );
        assert_eq!(cfg.top_p, Some(0.9));
    }

    #[test]
    fn default_stop_sequences_used_when_absent() {
        let cfg = build_generation_config("gemini-2.5-pro", false, None, None, None, None, 64000, None);
        assert_eq!(
            cfg.stop_sequences,
            Some(DEFAULT_STOP_SEQUENCES.iter().map(|s| s.to_string()).collect())
        );
    }
}
