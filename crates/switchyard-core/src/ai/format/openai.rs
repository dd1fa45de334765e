//! OpenAI API format handler
//!
//! Handles conversion to and from the chat/completions format used by
//! OpenAI, Azure OpenAI, Ollama-style local servers and LM Studio.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::schema::simplify_for_strict_backend;
use super::{
    function_call_part, normalize_finish_reason, parse_arguments, render_tool_results_as_text,
    require_model, response_text, FormatHandler, RequestOptions,
};
use crate::ai::parsers::OpenAIParser;
use crate::ai::sse::SseParser;
use crate::ai::types::{
    Content, GenerateContentRequest, GenerateContentResponse, Part, Role, ToolDeclaration,
    UsageMetadata,
};
use crate::error::{AdapterError, Result};

/// OpenAI format handler
#[derive(Debug, Default)]
pub struct OpenAIFormat;

impl OpenAIFormat {
    pub fn new() -> Self {
        Self
    }

    /// Convert normalized turns to chat messages
    ///
    /// Function responses become `tool` messages placed before any text of the
    /// same turn, so they directly follow the assistant's `tool_calls`.
    fn convert_messages(&self, contents: &[Content]) -> Vec<ChatMessage> {
        let mut messages = Vec::new();

        for content in contents {
            let role = match content.role {
                Role::User => "user",
                Role::Model => "assistant",
            };

            let mut lines: Vec<String> = Vec::new();
            let mut tool_calls = Vec::new();

            for part in &content.parts {
                match part {
                    Part::Text(text) => lines.push(text.clone()),
                    Part::FunctionCall(call) => tool_calls.push(ChatToolCall {
                        id: call.id.clone().unwrap_or_else(|| call.name.clone()),
                        kind: "function",
                        function: ChatFunctionCall {
                            name: call.name.clone(),
                            arguments: Value::Object(call.args.clone()).to_string(),
                        },
                    }),
                    Part::FunctionResponse(response) => messages.push(ChatMessage {
                        role: "tool",
                        content: Some(response_text(response, false)),
                        tool_calls: Vec::new(),
                        tool_call_id: Some(response.id.clone().unwrap_or_else(|| response.name.clone())),
                    }),
                    // No inline media on this path; the part is passed as its JSON text
                    Part::InlineData(_) => {
                        lines.push(serde_json::to_string(part).unwrap_or_default())
                    }
                }
            }

            let text = lines.join("\n");
            if text.is_empty() && tool_calls.is_empty() {
                continue;
            }

            messages.push(ChatMessage {
                role,
                content: if text.is_empty() { None } else { Some(text) },
                tool_calls,
                tool_call_id: None,
            });
        }

        messages
    }

    fn convert_tools(&self, tools: &[ToolDeclaration], simplify: bool) -> Vec<ChatTool> {
        tools
            .iter()
            .map(|tool| {
                let parameters = tool.parameters_or_empty();
                ChatTool {
                    kind: "function",
                    function: ChatFunction {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: if simplify {
                            simplify_for_strict_backend(&parameters)
                        } else {
                            parameters
                        },
                    },
                }
            })
            .collect()
    }
}

impl FormatHandler for OpenAIFormat {
    fn build_request_body(
        &self,
        request: &GenerateContentRequest,
        options: &RequestOptions,
    ) -> Result<Value> {
        require_model(options.model)?;

        let contents = if options.capabilities.tool_results_as_text {
            render_tool_results_as_text(&request.contents)
        } else {
            request.contents.clone()
        };

        let mut messages = self.convert_messages(&contents);
        if let Some(instruction) = request.generation_config.json_instruction() {
            messages.insert(
                0,
                ChatMessage {
                    role: "system",
                    content: Some(instruction),
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                },
            );
        }

        let config = &request.generation_config;
        let sampling = options.sampling;
        let tools = self.convert_tools(&request.tools, options.capabilities.simplify_tool_schemas);

        let body = ChatRequest {
            model: options.model,
            messages,
            temperature: config.temperature.unwrap_or(sampling.temperature),
            max_tokens: config.max_output_tokens.unwrap_or(sampling.max_tokens),
            top_p: config.top_p.unwrap_or(sampling.top_p),
            frequency_penalty: sampling.explicit_penalties.then_some(0.0),
            presence_penalty: sampling.explicit_penalties.then_some(0.0),
            stream: options.streaming,
            stream_options: (options.streaming && sampling.stream_usage)
                .then_some(StreamOptions { include_usage: true }),
            tool_choice: (!tools.is_empty()).then_some("auto"),
            tools,
        };

        Ok(serde_json::to_value(body)?)
    }

    fn parse_response(&self, body: &[u8]) -> Result<GenerateContentResponse> {
        let completion: ChatCompletion = serde_json::from_slice(body)?;
        completion.into_response()
    }

    fn stream_parser(&self) -> Box<dyn SseParser> {
        Box::new(OpenAIParser::new())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ChatMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ChatToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ChatToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: ChatFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ChatFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: Value,
}

/// Token usage block shared by complete responses and stream chunks
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct ChatUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
    #[serde(default)]
    total_tokens: Option<u64>,
}

impl From<ChatUsage> for UsageMetadata {
    fn from(usage: ChatUsage) -> Self {
        UsageMetadata::new(
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Option<Vec<Choice>>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ResponseFunction>,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    #[serde(default)]
    name: Option<String>,
    /// Usually a JSON string; some servers send an object
    #[serde(default)]
    arguments: Option<Value>,
}

impl ChatCompletion {
    fn into_response(self) -> Result<GenerateContentResponse> {
        let choice = self
            .choices
            .and_then(|choices| choices.into_iter().next())
            .ok_or_else(|| AdapterError::Conversion("No choices in response".to_string()))?;

        let message = choice.message.unwrap_or_default();
        let mut parts = Vec::new();

        if let Some(text) = message.content.filter(|t| !t.is_empty()) {
            parts.push(Part::Text(text));
        }
        for call in message.tool_calls.unwrap_or_default() {
            let Some(function) = call.function else {
                continue;
            };
            let name = function.name.unwrap_or_default();
            let args: Map<String, Value> = parse_arguments(function.arguments.as_ref());
            parts.push(function_call_part(call.id, &name, args));
        }

        Ok(GenerateContentResponse::from_parts(
            parts,
            Some(normalize_finish_reason(choice.finish_reason.as_deref())),
            self.usage.map(UsageMetadata::from).unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::providers::{BackendCapabilities, ProviderId, SamplingDefaults};
    use crate::ai::types::{FunctionCall, FunctionResponse, GenerationConfig, InlineData};
    use serde_json::json;

    fn weather_tool() -> ToolDeclaration {
        ToolDeclaration::new(
            "get_weather",
            "Current weather for a city",
            json!({
                "type": "object",
                "properties": {"location": {"type": "string"}},
                "required": ["location"]
            }),
        )
    }

    fn build(request: &GenerateContentRequest, sampling: &SamplingDefaults, streaming: bool) -> Value {
        let options = RequestOptions {
            model: "gpt-4o-mini",
            streaming,
            sampling,
            capabilities: BackendCapabilities::default(),
        };
        OpenAIFormat::new().build_request_body(request, &options).unwrap()
    }

    #[test]
    fn test_basic_request_defaults() {
        let request = GenerateContentRequest::new(vec![Content::user("hi")]);
        let body = build(&request, &SamplingDefaults::default(), false);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));
        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(body["top_p"], 1.0);
        assert_eq!(body["stream"], false);
        assert!(body["temperature"].as_f64().is_some_and(|t| (t - 0.7).abs() < 1e-6));
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("frequency_penalty").is_none());
    }

    #[test]
    fn test_explicit_zero_temperature_is_honored() {
        let request = GenerateContentRequest::new(vec![Content::user("hi")]).with_generation_config(
            GenerationConfig {
                temperature: Some(0.0),
                max_output_tokens: Some(64),
                ..Default::default()
            },
        );
        let body = build(&request, &SamplingDefaults::default(), false);
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["max_tokens"], 64);
    }

    #[test]
    fn test_lm_studio_sampling_and_stream_usage() {
        let request = GenerateContentRequest::new(vec![Content::user("hi")]);
        let sampling = ProviderId::LmStudio.profile().sampling;

        let streaming = build(&request, &sampling, true);
        assert_eq!(streaming["frequency_penalty"], 0.0);
        assert_eq!(streaming["presence_penalty"], 0.0);
        assert_eq!(streaming["stream_options"], json!({"include_usage": true}));
        assert!(streaming["top_p"].as_f64().is_some_and(|p| (p - 0.9).abs() < 1e-6));

        let blocking = build(&request, &sampling, false);
        assert!(blocking.get("stream_options").is_none());
    }

    #[test]
    fn test_role_mapping_and_text_joining() {
        let request = GenerateContentRequest::new(vec![
            Content {
                role: Role::User,
                parts: vec![Part::text("line one"), Part::text("line two")],
            },
            Content::model(vec![Part::text("answer")]),
        ]);
        let body = build(&request, &SamplingDefaults::default(), false);
        assert_eq!(body["messages"][0]["content"], "line one\nline two");
        assert_eq!(body["messages"][1]["role"], "assistant");
    }

    #[test]
    fn test_empty_turns_are_dropped() {
        let request = GenerateContentRequest::new(vec![
            Content::user("first"),
            Content {
                role: Role::Model,
                parts: vec![],
            },
            Content {
                role: Role::User,
                parts: vec![Part::text("")],
            },
            Content::user("second"),
        ]);
        let body = build(&request, &SamplingDefaults::default(), false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages.len() < request.contents.len());
    }

    #[test]
    fn test_json_mode_adds_system_message() {
        let request = GenerateContentRequest::new(vec![Content::user("list colors")])
            .with_generation_config(GenerationConfig {
                response_mime_type: Some("application/json".into()),
                response_schema: Some(json!({"type": "array"})),
                ..Default::default()
            });
        let body = build(&request, &SamplingDefaults::default(), false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][0]["content"]
            .as_str()
            .is_some_and(|c| c.ends_with(r#"{"type":"array"}"#)));
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn test_tool_declarations_and_choice() {
        let request =
            GenerateContentRequest::new(vec![Content::user("weather?")]).with_tools(vec![weather_tool()]);
        let body = build(&request, &SamplingDefaults::default(), false);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "get_weather");
        assert_eq!(
            body["tools"][0]["function"]["parameters"]["required"],
            json!(["location"])
        );
    }

    #[test]
    fn test_tool_without_parameters_gets_empty_object_schema() {
        let tool = ToolDeclaration {
            name: "ping".into(),
            description: String::new(),
            parameters: None,
        };
        let request = GenerateContentRequest::new(vec![Content::user("x")]).with_tools(vec![tool]);
        let body = build(&request, &SamplingDefaults::default(), false);
        assert_eq!(
            body["tools"][0]["function"]["parameters"],
            json!({"type": "object", "properties": {}})
        );
    }

    #[test]
    fn test_schema_simplified_only_when_flagged() {
        let tool = ToolDeclaration::new(
            "pick",
            "",
            json!({"type": "OBJECT", "properties": {"v": {"anyOf": [{"type": "string"}]}}}),
        );
        let request = GenerateContentRequest::new(vec![Content::user("x")]).with_tools(vec![tool]);
        let sampling = SamplingDefaults::default();

        let strict = RequestOptions {
            model: "deepseek-chat",
            streaming: false,
            sampling: &sampling,
            capabilities: BackendCapabilities::for_provider(
                ProviderId::OpenAiCompatible,
                "https://api.deepseek.com/v1",
            ),
        };
        let body = OpenAIFormat::new().build_request_body(&request, &strict).unwrap();
        assert_eq!(body["tools"][0]["function"]["parameters"]["type"], "object");
        assert!(body["tools"][0]["function"]["parameters"]["properties"]["v"]
            .get("anyOf")
            .is_none());

        let plain = build(&request, &sampling, false);
        assert_eq!(plain["tools"][0]["function"]["parameters"]["type"], "OBJECT");
    }

    #[test]
    fn test_function_calls_and_results_stay_structured() {
        let request = GenerateContentRequest::new(vec![
            Content::user("weather in Paris?"),
            Content::model(vec![Part::FunctionCall(FunctionCall {
                id: Some("c1".into()),
                name: "get_weather".into(),
                args: parse_arguments(Some(&json!({"location": "Paris"}))),
            })]),
            Content {
                role: Role::User,
                parts: vec![Part::FunctionResponse(FunctionResponse {
                    id: Some("c1".into()),
                    name: "get_weather".into(),
                    response: json!({"temp": 21}),
                })],
            },
        ]);
        let body = build(&request, &SamplingDefaults::default(), false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);

        let call = &messages[1]["tool_calls"][0];
        assert_eq!(call["id"], "c1");
        assert_eq!(call["function"]["arguments"], r#"{"location":"Paris"}"#);
        assert!(messages[1].get("content").is_none());

        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "c1");
        assert_eq!(messages[2]["content"], r#"{"temp":21}"#);
    }

    #[test]
    fn test_tool_call_id_falls_back_to_name() {
        let request = GenerateContentRequest::new(vec![Content {
            role: Role::User,
            parts: vec![Part::FunctionResponse(FunctionResponse {
                id: None,
                name: "read_file".into(),
                response: json!("contents"),
            })],
        }]);
        let body = build(&request, &SamplingDefaults::default(), false);
        assert_eq!(body["messages"][0]["tool_call_id"], "read_file");
        assert_eq!(body["messages"][0]["content"], "contents");
    }

    #[test]
    fn test_inline_data_is_sent_as_json_text() {
        let request = GenerateContentRequest::new(vec![Content {
            role: Role::User,
            parts: vec![Part::InlineData(InlineData {
                mime_type: "image/png".into(),
                data: "AAAA".into(),
            })],
        }]);
        let body = build(&request, &SamplingDefaults::default(), false);
        let content = body["messages"][0]["content"].as_str().unwrap();
        assert!(content.contains("inlineData"));
        assert!(content.contains("image/png"));
    }

    #[test]
    fn test_missing_model_is_rejected() {
        let request = GenerateContentRequest::new(vec![Content::user("hi")]);
        let sampling = SamplingDefaults::default();
        let options = RequestOptions {
            model: "",
            streaming: false,
            sampling: &sampling,
            capabilities: BackendCapabilities::default(),
        };
        assert!(OpenAIFormat::new().build_request_body(&request, &options).is_err());
    }

    #[test]
    fn test_parse_bonjour_response() {
        let body = json!({
            "choices": [{"message": {"content": "Bonjour"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        });
        let response = OpenAIFormat::new()
            .parse_response(body.to_string().as_bytes())
            .unwrap();
        assert_eq!(response.text(), "Bonjour");
        assert_eq!(response.finish_reason(), Some("STOP"));
        assert_eq!(response.usage_metadata, UsageMetadata::new(5, 2, 7));
        assert!(response.function_calls().is_empty());
    }

    #[test]
    fn test_parse_tool_calls_with_partial_failure() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "get_weather", "arguments": "{\"location\":\"Paris\"}"}},
                        {"id": "b", "type": "function", "function": {"name": "get_time", "arguments": "{\"zone\":"}},
                        {"id": "c", "type": "function", "function": {"name": "read-file", "arguments": {"path": "/x"}}}
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let response = OpenAIFormat::new()
            .parse_response(body.to_string().as_bytes())
            .unwrap();
        let calls = response.function_calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].args["location"], "Paris");
        assert_eq!(calls[1].name, "get_time");
        assert!(calls[1].args.is_empty());
        assert_eq!(calls[2].name, "read_file");
        assert_eq!(calls[2].args["absolute_path"], "/x");
        assert_eq!(response.finish_reason(), Some("tool_calls"));
        assert_eq!(response.text(), "");
        assert_eq!(response.usage_metadata, UsageMetadata::default());
    }

    #[test]
    fn test_empty_choices_is_conversion_error() {
        let err = OpenAIFormat::new()
            .parse_response(br#"{"choices": []}"#)
            .unwrap_err();
        assert_eq!(err.code(), "ConversionError");

        let err = OpenAIFormat::new().parse_response(br#"{"id": "x"}"#).unwrap_err();
        assert_eq!(err.code(), "ConversionError");
    }

    #[test]
    fn test_unparsable_body_is_conversion_error() {
        let err = OpenAIFormat::new().parse_response(b"<html>").unwrap_err();
        assert_eq!(err.code(), "ConversionError");
    }

    #[test]
    fn test_tool_call_round_trip_keeps_name_and_keys() {
        let request =
            GenerateContentRequest::new(vec![Content::user("weather?")]).with_tools(vec![weather_tool()]);
        let body = build(&request, &SamplingDefaults::default(), false);
        let declared = &body["tools"][0]["function"];

        let reply = json!({
            "choices": [{
                "message": {"tool_calls": [{
                    "id": "c1",
                    "type": "function",
                    "function": {"name": declared["name"], "arguments": "{\"location\":\"Paris\"}"}
                }]},
                "finish_reason": "tool_calls"
            }]
        });
        let response = OpenAIFormat::new()
            .parse_response(reply.to_string().as_bytes())
            .unwrap();
        let call = &response.function_calls()[0];
        assert_eq!(call.name, "get_weather");
        let keys: Vec<&String> = call.args.keys().collect();
        assert_eq!(keys, vec!["location"]);
    }
}
