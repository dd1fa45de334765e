//! API Format handling
//!
//! Abstracts the differences between the OpenAI chat/completions and
//! Anthropic messages wire formats. Each format handler knows how to build a
//! request body from a normalized request, parse a complete response body,
//! and create a parser for its streaming events.
//!
//! Wire payloads are typed serde structs on both sides; only the finished
//! request body leaves a handler as a `serde_json::Value`.

pub mod anthropic;
pub mod openai;
pub mod schema;

use serde_json::{Map, Value};
use tracing::warn;

use crate::ai::normalize::normalize_tool_call;
use crate::ai::providers::{ApiFormat, BackendCapabilities, SamplingDefaults};
use crate::ai::sse::SseParser;
use crate::ai::types::{
    Content, FunctionCall, FunctionResponse, GenerateContentRequest, GenerateContentResponse, Part,
    Role,
};
use crate::error::{AdapterError, Result};

/// Trait for handling different API formats
pub trait FormatHandler: Send + Sync {
    /// Build the complete request body
    fn build_request_body(
        &self,
        request: &GenerateContentRequest,
        options: &RequestOptions,
    ) -> Result<Value>;

    /// Parse a complete (non-streaming) response body
    fn parse_response(&self, body: &[u8]) -> Result<GenerateContentResponse>;

    /// Create a parser for this format's streaming events
    fn stream_parser(&self) -> Box<dyn SseParser>;
}

/// Options for building API requests
#[derive(Debug, Clone, Copy)]
pub struct RequestOptions<'a> {
    /// Resolved model: the request's model, else the generator's configured one
    pub model: &'a str,
    pub streaming: bool,
    pub sampling: &'a SamplingDefaults,
    pub capabilities: BackendCapabilities,
}

/// Select the format handler for a wire family
pub fn get_format_handler(format: ApiFormat) -> Box<dyn FormatHandler> {
    match format {
        ApiFormat::OpenAI => Box::new(openai::OpenAIFormat::new()),
        ApiFormat::Anthropic => Box::new(anthropic::AnthropicFormat::new()),
    }
}

pub(crate) fn require_model(model: &str) -> Result<()> {
    if model.trim().is_empty() {
        return Err(AdapterError::Config(
            "no model given in the request or the generator config".to_string(),
        ));
    }
    Ok(())
}

/// Map a backend stop reason onto the normalized set
///
/// `stop` and `end_turn` become `STOP`, `tool_use` becomes `tool_calls`,
/// anything else passes through. A missing reason counts as `STOP`.
pub fn normalize_finish_reason(reason: Option<&str>) -> String {
    match reason {
        None | Some("stop") | Some("end_turn") => "STOP".to_string(),
        Some("tool_use") => "tool_calls".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Decode tool-call arguments from a JSON string or an inline object.
/// Anything unusable becomes an empty mapping.
pub fn parse_arguments(raw: Option<&Value>) -> Map<String, Value> {
    match raw {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(text)) => parse_argument_text(text),
        Some(Value::Null) | None => Map::new(),
        Some(other) => {
            warn!(kind = %json_kind(other), "Tool arguments are not an object, using empty arguments");
            Map::new()
        }
    }
}

/// Decode accumulated tool-call argument text
pub fn parse_argument_text(text: &str) -> Map<String, Value> {
    if text.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(kind = %json_kind(&other), "Tool arguments are not an object, using empty arguments");
            Map::new()
        }
        Err(e) => {
            warn!(error = %e, len = text.len(), "Malformed tool arguments, using empty arguments");
            Map::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Build a function-call part with the host's canonical name and argument keys
pub fn function_call_part(id: Option<String>, name: &str, args: Map<String, Value>) -> Part {
    let (name, args) = normalize_tool_call(name, args);
    Part::FunctionCall(FunctionCall { id, name, args })
}

/// Text for a function response: strings verbatim, other values as JSON
pub(crate) fn response_text(response: &FunctionResponse, pretty: bool) -> String {
    match &response.response {
        Value::String(text) => text.clone(),
        other if pretty => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        other => other.to_string(),
    }
}

/// Replace the function responses of each user turn with a Markdown summary
///
/// This is a lossy fallback for backends flagged with `tool_results_as_text`:
/// the backend sees the results as plain user text and the structured
/// tool-result pairing is given up.
pub fn render_tool_results_as_text(contents: &[Content]) -> Vec<Content> {
    contents
        .iter()
        .map(|content| {
            if content.role != Role::User || content.function_responses().next().is_none() {
                return content.clone();
            }
            Content {
                role: Role::User,
                parts: vec![Part::Text(tool_results_markdown(content))],
            }
        })
        .collect()
}

fn tool_results_markdown(content: &Content) -> String {
    let texts: Vec<&str> = content
        .parts
        .iter()
        .filter_map(Part::as_text)
        .filter(|t| !t.is_empty())
        .collect();

    let mut summary = String::new();
    if !texts.is_empty() {
        summary.push_str(&texts.join("\n"));
        summary.push_str("\n\n");
    }
    summary.push_str("## Tool Execution Completed\n\n");
    summary.push_str("The following tools have been executed successfully:\n\n");
    for response in content.function_responses() {
        summary.push_str(&format!("### {}\n", response.name));
        summary.push_str("```\n");
        summary.push_str(&response_text(response, true));
        summary.push_str("\n```\n\n");
    }
    summary.push_str(
        "**Task completed successfully.** Please provide a summary of these results and any insights.",
    );
    summary
}
