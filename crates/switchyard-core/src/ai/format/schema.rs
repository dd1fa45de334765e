//! Tool schema simplification for strict backends
//!
//! Some OpenAI-compatible servers (DeepSeek in particular) reject schemas
//! that use composition keywords, patterns or uncommon formats. Tool
//! parameters sent to those backends are reduced to plain object/property
//! schemas with lower-case type names.

use serde_json::{json, Map, Value};

/// Keywords removed from every schema node
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "anyOf",
    "oneOf",
    "allOf",
    "not",
    "$defs",
    "definitions",
    "pattern",
    "const",
    "enum",
];

/// Formats kept on simplified schemas
const KEPT_FORMATS: &[&str] = &["date-time", "email", "uri"];

/// Return a simplified copy of a tool parameter schema
pub fn simplify_for_strict_backend(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(simplify_object(map)),
        _ => json!({"type": "object", "properties": {}}),
    }
}

fn simplify_object(map: &Map<String, Value>) -> Map<String, Value> {
    let mut simplified = map.clone();

    for keyword in UNSUPPORTED_KEYWORDS {
        simplified.remove(*keyword);
    }

    if let Some(type_value) = simplified.get_mut("type") {
        lowercase_type(type_value);
    }

    let drop_format = simplified
        .get("format")
        .and_then(Value::as_str)
        .is_some_and(|f| !KEPT_FORMATS.contains(&f));
    if drop_format {
        simplified.remove("format");
    }

    if let Some(Value::Object(properties)) = simplified.get_mut("properties") {
        for property in properties.values_mut() {
            if let Value::Object(inner) = property {
                *inner = simplify_object(inner);
            }
        }
    }

    for key in ["items", "additionalProperties"] {
        if let Some(Value::Object(inner)) = simplified.get_mut(key) {
            *inner = simplify_object(inner);
        }
    }

    simplified
}

fn lowercase_type(value: &mut Value) {
    match value {
        Value::String(name) => *name = name.to_lowercase(),
        Value::Array(names) => {
            for name in names.iter_mut() {
                if let Value::String(n) = name {
                    *n = n.to_lowercase();
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_composition_keywords_and_lowercases_types() {
        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "mode": {"type": "STRING", "enum": ["a", "b"], "pattern": "^[ab]$"},
                "target": {"anyOf": [{"type": "string"}, {"type": "null"}]},
                "tags": {"type": ["ARRAY", "null"], "items": {"type": "STRING", "const": "x"}}
            },
            "required": ["mode"]
        });

        let simplified = simplify_for_strict_backend(&schema);
        assert_eq!(
            simplified,
            json!({
                "type": "object",
                "properties": {
                    "mode": {"type": "string"},
                    "target": {},
                    "tags": {"type": ["array", "null"], "items": {"type": "string"}}
                },
                "required": ["mode"]
            })
        );
    }

    #[test]
    fn test_format_filter() {
        let schema = json!({
            "type": "object",
            "properties": {
                "when": {"type": "string", "format": "date-time"},
                "host": {"type": "string", "format": "hostname"}
            }
        });
        let simplified = simplify_for_strict_backend(&schema);
        assert_eq!(simplified["properties"]["when"]["format"], "date-time");
        assert!(simplified["properties"]["host"].get("format").is_none());
    }

    #[test]
    fn test_additional_properties_simplified() {
        let schema = json!({
            "type": "object",
            "additionalProperties": {"type": "STRING", "oneOf": []}
        });
        assert_eq!(
            simplify_for_strict_backend(&schema)["additionalProperties"],
            json!({"type": "string"})
        );
    }

    #[test]
    fn test_non_object_schema_becomes_empty_object_schema() {
        assert_eq!(
            simplify_for_strict_backend(&json!(true)),
            json!({"type": "object", "properties": {}})
        );
    }

    #[test]
    fn test_input_left_untouched() {
        let schema = json!({"type": "OBJECT", "anyOf": []});
        let _ = simplify_for_strict_backend(&schema);
        assert_eq!(schema["type"], "OBJECT");
    }
}
