//! Tool parameter schema sanitization
//!
//! Discovered tool schemas are cleaned in place before they are offered to a
//! backend: `default` is dropped next to `anyOf`, and string `format` values
//! are limited to `enum` and `date-time`.
//!
//! Local `$ref` pointers are followed, so the schema is walked as a graph.
//! Nodes are identified by their JSON pointer and each one is sanitized at
//! most once, which keeps self-referencing schemas from looping.

use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// String formats every backend accepts
const ALLOWED_STRING_FORMATS: &[&str] = &["enum", "date-time"];

/// Sanitize a parameter schema in place
pub fn sanitize_parameters(schema: &mut Value) {
    let mut visited: HashSet<String> = HashSet::new();
    let mut pending: Vec<String> = vec![String::new()];

    while let Some(pointer) = pending.pop() {
        if !visited.insert(pointer.clone()) {
            continue;
        }
        let Some(node) = schema.pointer_mut(&pointer) else {
            debug!(pointer = %pointer, "Schema reference does not resolve, skipping");
            continue;
        };
        sanitize_node(node, &pointer, &mut pending);
    }
}

/// Clean one node and queue its child schemas
fn sanitize_node(node: &mut Value, pointer: &str, pending: &mut Vec<String>) {
    let Value::Object(map) = node else {
        return;
    };

    if let Some(Value::String(reference)) = map.get("$ref") {
        if let Some(target) = reference.strip_prefix('#') {
            pending.push(target.to_string());
        }
    }

    if let Some(Value::Array(variants)) = map.get("anyOf") {
        let count = variants.len();
        map.remove("default");
        for i in 0..count {
            pending.push(format!("{}/anyOf/{}", pointer, i));
        }
    }

    if matches!(map.get("items"), Some(Value::Object(_))) {
        pending.push(format!("{}/items", pointer));
    }

    if let Some(Value::Object(properties)) = map.get("properties") {
        // Reverse so properties are visited in declaration order off the stack
        for key in properties.keys().rev() {
            pending.push(format!("{}/properties/{}", pointer, escape_pointer_token(key)));
        }
    }

    let is_string = map
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.eq_ignore_ascii_case("string"));
    if is_string {
        let unsupported = map
            .get("format")
            .and_then(Value::as_str)
            .is_some_and(|f| !ALLOWED_STRING_FORMATS.contains(&f));
        if unsupported {
            map.remove("format");
        }
    }
}

/// Escape a key for use as a JSON pointer token (RFC 6901)
fn escape_pointer_token(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
