use protogate_schema::message::ToolResultContent;

/// Stringifies a `tool_result` block's content the way both the translator
/// (building an upstream `functionResponse`) and the token estimator need
/// it: a bare string passes through, an array of text fragments is joined,
/// and an arbitrary JSON object is serialized.
pub fn render_tool_result_content(content: &ToolResultContent) -> String {
    match content {
        ToolResultContent::Empty => String::new(),
        ToolResultContent::Text(s) => s.clone(),
        ToolResultContent::Fragments(fragments) => fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        ToolResultContent::Json(value) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protogate_schema::message::ToolResultContent;
    use serde_json::json;

    #[test]
    fn stringifies_every_content_shape() {
        assert_eq!(render_tool_result_content(&ToolResultContent::Empty), "");
        assert_eq!(
            render_tool_result_content(&ToolResultContent::Text("hi".into())),
            "hi"
        );
        assert_eq!(
            render_tool_result_content(&ToolResultContent::Json(json!({"a": 1}))),
            "{\"a\":1}"
        );
    }
}
