//! Tool call normalization
//!
//! Different models name the same logical tool differently (`edit-file`,
//! `edit`, `replace`) and use different argument keys for the same value.
//! Every function call leaving a backend goes through [`normalize_tool_call`]
//! so the host only ever sees its own tool names and argument keys.

use serde_json::{Map, Value};
use tracing::{debug, warn};

/// `(observed key, canonical key)` substitutions for one canonical tool
type AliasTable = &'static [(&'static str, &'static str)];

const READ_FILE_ALIASES: AliasTable = &[("file_path", "absolute_path"), ("path", "absolute_path")];

const WRITE_FILE_ALIASES: AliasTable = &[
    ("absolute_path", "file_path"),
    ("path", "file_path"),
    ("text", "content"),
    ("contents", "content"),
    ("data", "content"),
];

const REPLACE_ALIASES: AliasTable = &[
    ("absolute_path", "file_path"),
    ("path", "file_path"),
    ("original_string", "old_string"),
    ("original_text", "old_string"),
    ("replacement_string", "new_string"),
    ("replacement_text", "new_string"),
    ("replacement", "new_string"),
];

/// Map an observed tool name onto the host's canonical name
pub fn normalize_tool_name(name: &str) -> String {
    let folded = name.replace('-', "_");
    match folded.as_str() {
        "edit" | "edit_file" => "replace".to_string(),
        "append" | "append_file" | "append_to_file" => {
            // No append tool exists on the host side; the closest is a full write.
            warn!(
                tool = %folded,
                "Tool has no direct equivalent, treating as write_file"
            );
            "write_file".to_string()
        }
        _ => folded,
    }
}

fn aliases_for(canonical_name: &str) -> AliasTable {
    match canonical_name {
        "read_file" => READ_FILE_ALIASES,
        "write_file" => WRITE_FILE_ALIASES,
        "replace" => REPLACE_ALIASES,
        _ => &[],
    }
}

/// Rename argument keys for a canonical tool. A key is only moved when the
/// canonical key is absent, so present canonical values always win.
pub fn normalize_tool_args(canonical_name: &str, mut args: Map<String, Value>) -> Map<String, Value> {
    for (observed, canonical) in aliases_for(canonical_name) {
        if args.contains_key(*canonical) {
            continue;
        }
        if let Some(value) = args.remove(*observed) {
            debug!(tool = canonical_name, from = observed, to = canonical, "Renamed tool argument");
            args.insert((*canonical).to_string(), value);
        }
    }
    args
}

/// Normalize a function call's name and arguments. Total and deterministic:
/// unknown names and keys pass through unchanged.
pub fn normalize_tool_call(name: &str, args: Map<String, Value>) -> (String, Map<String, Value>) {
    let canonical = normalize_tool_name(name);
    let args = normalize_tool_args(&canonical, args);
    (canonical, args)
}
