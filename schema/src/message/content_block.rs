use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed content block of the client-facing message schema.
///
/// Unknown/extension fields are intentionally not preserved here (unlike the
/// upstream `gemini` types): this is the boundary-facing schema and we want
/// strict rejection of malformed client input, reported as a
/// `TranslationInput` error, not silent pass-through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        source: ImageSource,
    },
    Thinking {
        thinking: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    RedactedThinking {
        data: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: ToolResultContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// `image` block source: either inline base64 bytes or an external URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

/// `tool_result` content may be a bare string, an array of text fragments,
/// or an arbitrary JSON object — all three are stringified by the
/// translator before being placed into the upstream `functionResponse`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(untagged)]
pub enum ToolResultContent {
    #[default]
    Empty,
    Text(String),
    Fragments(Vec<TextFragment>),
    Json(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextFragment {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// A client-declared tool, carrying a JSON-Schema-ish `input_schema`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub input_schema: Value,
}
