use serde_json::Value;

/// Facets whose removal is recorded (in `name: name` form) in the root
/// schema's `description`, so the model is told a constraint existed
/// without leaking its exact threshold into an otherwise-cleaned schema.
const RECORDED_FACETS: &[&str] = &[
    "minLength",
    "maxLength",
    "minimum",
    "maximum",
    "minItems",
    "maxItems",
    "minProperties",
    "maxProperties",
    "pattern",
    "format",
    "multipleOf",
];

/// Keys dropped everywhere with no trace left behind.
const SILENT_KEYS: &[&str] = &["$schema", "uniqueItems", "exclusiveMinimum", "exclusiveMaximum"];

#[derive(Default)]
struct Strips {
    facets: Vec<String>,
    additional_properties_false: bool,
}

/// Recursively strips validation facets a tool's JSON Schema carries that
/// the upstream function-declaration schema doesn't accept, intersects
/// every `required` array against its sibling `properties`, and — at the
/// root only — records what was stripped in `description` so the model
/// still knows a constraint existed.
///
/// Destructive: clones nothing it doesn't have to, consumes `schema` in
/// place. Callers that need the original afterwards must clone first.
pub fn clean_json_schema(schema: &mut Value) {
    let mut strips = Strips::default();
    clean_node(schema, &mut strips);

    if strips.facets.is_empty() && !strips.additional_properties_false {
        return;
    }

    let mut parts: Vec<String> = strips.facets.iter().map(|f| format!("{f}: {f}")).collect();
    if strips.additional_properties_false {
        parts.push("no additional properties".to_string());
    }
    let note = format!("({})", parts.join(", "));

    if let Value::Object(map) = schema {
        let combined = match map.get("description").and_then(Value::as_str) {
            Some(existing) if !existing.is_empty() => format!("{existing} {note}"),
            _ => note,
        };
        map.insert("description".to_string(), Value::String(combined));
    }
}

fn clean_node(node: &mut Value, strips: &mut Strips) {
    match node {
        Value::Object(map) => {
            for key in SILENT_KEYS {
                map.remove(*key);
            }
            if let Some(Value::Bool(false)) = map.remove("additionalProperties") {
                strips.additional_properties_false = true;
            }
            for facet in RECORDED_FACETS {
                if map.remove(*facet).is_some() {
                    strips.facets.push((*facet).to_string());
                }
            }

            for value in map.values_mut() {
                clean_node(value, strips);
            }

            let property_keys: Option<Vec<String>> = map
                .get("properties")
                .and_then(Value::as_object)
                .map(|props| props.keys().cloned().collect());
            if let Some(property_keys) = property_keys {
                if let Some(Value::Array(required)) = map.get("required") {
                    let intersected: Vec<Value> = required
                        .iter()
                        .filter(|v| v.as_str().is_some_and(|s| property_keys.iter().any(|p| p == s)))
                        .cloned()
                        .collect();
                    if intersected.is_empty() {
                        map.remove("required");
                    } else {
                        map.insert("required".to_string(), Value::Array(intersected));
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                clean_node(item, strips);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_cleaning_reaches_fixed_point() {
        let mut schema = json!({
            "type": "object",
            "properties": {"x": {"type": "string", "minLength": 3}},
            "required": ["x", "y"],
            "additionalProperties": false,
            "$schema": "http://json-schema.org/draft-07/schema#",
        });

        clean_json_schema(&mut schema);

        assert_eq!(
            schema,
            json!({
                "type": "object",
                "properties": {"x": {"type": "string"}},
                "required": ["x"],
                "description": "(minLength: minLength, no additional properties)",
            })
        );
    }

    #[test]
    fn is_a_fixed_point() {
        let mut schema = json!({
            "type": "object",
            "properties": {"x": {"type": "string", "minLength": 3, "pattern": "^a"}},
            "required": ["x", "missing"],
            "additionalProperties": false,
        });
        clean_json_schema(&mut schema);
        let once = schema.clone();
        clean_json_schema(&mut schema);
        assert_eq!(schema, once);
    }

    #[test]
    fn untouched_schema_gets_no_description() {
        let mut schema = json!({"type": "string"});
        clean_json_schema(&mut schema);
        assert_eq!(schema, json!({"type": "string"}));
    }

    #[test]
    fn required_emptied_entirely_is_dropped() {
        let mut schema = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "required": ["ghost"],
        });
        clean_json_schema(&mut schema);
        assert_eq!(
            schema,
            json!({"type": "object", "properties": {"a": {"type": "string"}}})
        );
    }
}
