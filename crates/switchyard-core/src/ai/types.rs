//! Normalized content model
//!
//! The request/response shapes the host CLI consumes. Serialized field names
//! follow the home format (camelCase, `{"text": ...}` style parts) so these
//! values can be logged or persisted without another translation step.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants;

/// Conversation role. Backend roles are mapped onto this set at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Model,
}

/// A function invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// The result of running a function, sent back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

/// Base64 payload with its media type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// One part of a turn. Exactly one variant is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
    InlineData(InlineData),
}

impl Part {
    pub fn text(value: impl Into<String>) -> Self {
        Part::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    /// Concatenation of all text parts, in order
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }

    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(|p| match p {
            Part::FunctionCall(call) => Some(call),
            _ => None,
        })
    }

    pub fn function_responses(&self) -> impl Iterator<Item = &FunctionResponse> {
        self.parts.iter().filter_map(|p| match p {
            Part::FunctionResponse(resp) => Some(resp),
            _ => None,
        })
    }
}

/// Sampling and output controls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

impl GenerationConfig {
    /// Schema to emulate JSON mode with, when JSON output was requested
    pub fn json_schema(&self) -> Option<&Value> {
        match (&self.response_mime_type, &self.response_schema) {
            (Some(mime), Some(schema)) if mime == "application/json" => Some(schema),
            _ => None,
        }
    }

    /// Instruction text embedding the requested schema
    pub fn json_instruction(&self) -> Option<String> {
        self.json_schema()
            .map(|schema| format!("{}{}", constants::ai::JSON_MODE_INSTRUCTION, schema))
    }
}

/// A callable tool offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolDeclaration {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Some(parameters),
        }
    }

    /// Parameter schema, defaulting to an empty object schema
    pub fn parameters_or_empty(&self) -> Value {
        self.parameters
            .clone()
            .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}))
    }
}

/// Normalized generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Overrides the generator's configured model when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub contents: Vec<Content>,
    #[serde(default)]
    pub generation_config: GenerationConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclaration>,
}

impl GenerateContentRequest {
    pub fn new(contents: Vec<Content>) -> Self {
        Self {
            contents,
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = config;
        self
    }
}

/// Token accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl UsageMetadata {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }
}

/// A single response candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub index: u32,
}

/// Normalized response, or one frame of a streamed response
///
/// `text()` and `function_calls()` are derived from the first candidate so
/// they can never disagree with the candidate content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: UsageMetadata,
}

impl GenerateContentResponse {
    /// Response with one model candidate
    pub fn from_parts(parts: Vec<Part>, finish_reason: Option<String>, usage: UsageMetadata) -> Self {
        let parts = if parts.is_empty() {
            vec![Part::text("")]
        } else {
            parts
        };
        Self {
            candidates: vec![Candidate {
                content: Content::model(parts),
                finish_reason,
                index: 0,
            }],
            usage_metadata: usage,
        }
    }

    /// Frame carrying only token accounting
    pub fn usage_only(usage: UsageMetadata) -> Self {
        Self {
            candidates: Vec::new(),
            usage_metadata: usage,
        }
    }

    /// Concatenated text of the first candidate
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| c.content.text())
            .unwrap_or_default()
    }

    /// Function calls of the first candidate
    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.candidates
            .first()
            .map(|c| c.content.function_calls().cloned().collect())
            .unwrap_or_default()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
    }

    pub fn is_usage_only(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Token counting request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CountTokensRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountTokensResponse {
    pub total_tokens: u64,
}

/// Embedding request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EmbedContentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEmbedding {
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EmbedContentResponse {
    pub embeddings: Vec<ContentEmbedding>,
}

/// Join the text parts of every turn with single spaces
pub fn joined_text(contents: &[Content]) -> String {
    contents
        .iter()
        .map(|content| {
            content
                .parts
                .iter()
                .map(|p| p.as_text().unwrap_or(""))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Approximate token count: `ceil(chars / 4)`.
///
/// This is an estimate for backends without a tokenizer endpoint, not an
/// exact count.
pub fn approximate_token_count(contents: &[Content]) -> u64 {
    let chars = joined_text(contents).chars().count();
    chars.div_ceil(constants::ai::CHARS_PER_TOKEN) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_part_serializes_in_home_format() {
        let part = Part::text("hi");
        assert_eq!(serde_json::to_value(&part).unwrap(), json!({"text": "hi"}));

        let call = Part::FunctionCall(FunctionCall {
            id: Some("c1".into()),
            name: "get_weather".into(),
            args: Map::new(),
        });
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(value["functionCall"]["name"], "get_weather");
    }

    #[test]
    fn test_request_deserializes_from_camel_case() {
        let request: GenerateContentRequest = serde_json::from_value(json!({
            "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
            "generationConfig": {"temperature": 0.2, "maxOutputTokens": 100}
        }))
        .unwrap();
        assert_eq!(request.contents.len(), 1);
        assert_eq!(request.generation_config.temperature, Some(0.2));
        assert_eq!(request.generation_config.max_output_tokens, Some(100));
        assert!(request.tools.is_empty());
    }

    #[test]
    fn test_response_text_and_calls_come_from_first_candidate() {
        let response = GenerateContentResponse::from_parts(
            vec![
                Part::text("Bon"),
                Part::FunctionCall(FunctionCall {
                    id: None,
                    name: "noop".into(),
                    args: Map::new(),
                }),
                Part::text("jour"),
            ],
            Some("STOP".into()),
            UsageMetadata::default(),
        );
        assert_eq!(response.text(), "Bonjour");
        assert_eq!(response.function_calls().len(), 1);
        assert_eq!(response.finish_reason(), Some("STOP"));
    }

    #[test]
    fn test_empty_parts_still_yield_one_part() {
        let response = GenerateContentResponse::from_parts(vec![], None, UsageMetadata::default());
        assert_eq!(response.candidates[0].content.parts.len(), 1);
        assert_eq!(response.text(), "");
    }

    #[test]
    fn test_usage_only_frame() {
        let frame = GenerateContentResponse::usage_only(UsageMetadata::new(3, 0, 3));
        assert!(frame.is_usage_only());
        assert_eq!(frame.text(), "");
        assert!(frame.function_calls().is_empty());
    }

    #[test]
    fn test_json_instruction_requires_mime_and_schema() {
        let mut config = GenerationConfig {
            response_schema: Some(json!({"type": "object"})),
            ..Default::default()
        };
        assert!(config.json_instruction().is_none());

        config.response_mime_type = Some("application/json".into());
        let instruction = config.json_instruction().unwrap();
        assert!(instruction.starts_with("You must respond with valid JSON only."));
        assert!(instruction.ends_with(r#"{"type":"object"}"#));
    }

    #[test]
    fn test_approximate_token_count_rounds_up() {
        // "abcd efgh" is 9 chars -> ceil(9/4) = 3
        let contents = vec![Content {
            role: Role::User,
            parts: vec![Part::text("abcd"), Part::text("efgh")],
        }];
        assert_eq!(approximate_token_count(&contents), 3);
        assert_eq!(approximate_token_count(&[]), 0);
    }

    #[test]
    fn test_joined_text_ignores_non_text_parts() {
        let contents = vec![
            Content::user("one"),
            Content::model(vec![Part::FunctionCall(FunctionCall::default())]),
            Content::user("two"),
        ];
        assert_eq!(joined_text(&contents), "one  two");
    }
}
