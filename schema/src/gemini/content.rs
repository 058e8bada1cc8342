use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single conversation turn in the upstream request/response shape.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Content {
    /// `"user"` or `"model"`. Absent for `systemInstruction`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub parts: Vec<Part>,

    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One atomic piece of content inside a `Content` turn.
///
/// Mirrors the upstream union of text / inlineData / functionCall /
/// functionResponse, optionally flagged as a thought and carrying a
/// thought signature.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<Value>,

    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn thought_text(text: impl Into<String>) -> Self {
        Self {
            thought: Some(true),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn thought_signature_mut(&mut self) -> &mut Option<String> {
        &mut self.thought_signature
    }

    pub fn is_thought(&self) -> bool {
        self.thought == Some(true)
    }

    pub fn is_function_call(&self) -> bool {
        self.function_call.is_some()
    }
}
