//! Anthropic API format handler
//!
//! Converts normalized turns into Messages API content blocks and parses
//! complete message responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{
    function_call_part, normalize_finish_reason, parse_arguments, render_tool_results_as_text,
    require_model, response_text, FormatHandler, RequestOptions,
};
use crate::ai::parsers::AnthropicParser;
use crate::ai::sse::SseParser;
use crate::ai::types::{
    Content, GenerateContentRequest, GenerateContentResponse, Part, Role, ToolDeclaration,
    UsageMetadata,
};
use crate::constants;
use crate::error::{AdapterError, Result};

/// Anthropic format handler
#[derive(Debug, Default)]
pub struct AnthropicFormat;

impl AnthropicFormat {
    pub fn new() -> Self {
        Self
    }

    /// Convert normalized turns to Messages API messages.
    ///
    /// Anthropic has no system role here, so a JSON-mode instruction is placed
    /// as the leading text block of the first turn when that turn is the
    /// user's.
    fn convert_messages(&self, contents: &[Content], json_instruction: Option<String>) -> Vec<Message> {
        let mut messages = Vec::new();
        let mut instruction = json_instruction;

        for (i, content) in contents.iter().enumerate() {
            let mut blocks = Vec::new();

            if i == 0 && content.role == Role::User {
                if let Some(text) = instruction.take() {
                    blocks.push(ContentBlock::Text { text });
                }
            }

            for part in &content.parts {
                match part {
                    Part::Text(text) if text.is_empty() => {}
                    Part::Text(text) => blocks.push(ContentBlock::Text { text: text.clone() }),
                    Part::FunctionCall(call) => blocks.push(ContentBlock::ToolUse {
                        id: call.id.clone().unwrap_or_else(|| call.name.clone()),
                        name: call.name.clone(),
                        input: call.args.clone(),
                    }),
                    Part::FunctionResponse(response) => blocks.push(ContentBlock::ToolResult {
                        tool_use_id: response.id.clone().unwrap_or_else(|| response.name.clone()),
                        content: response_text(response, false),
                    }),
                    Part::InlineData(data) if data.mime_type.starts_with("image/") => {
                        blocks.push(ContentBlock::Image {
                            source: ImageSource {
                                kind: "base64",
                                media_type: data.mime_type.clone(),
                                data: data.data.clone(),
                            },
                        })
                    }
                    Part::InlineData(_) => blocks.push(ContentBlock::Text {
                        text: serde_json::to_string(part).unwrap_or_default(),
                    }),
                }
            }

            if blocks.is_empty() {
                debug!(turn = i, "Dropping empty turn");
                continue;
            }

            let only_tool_results = blocks
                .iter()
                .all(|b| matches!(b, ContentBlock::ToolResult { .. }));
            if content.role == Role::User && only_tool_results {
                blocks.insert(
                    0,
                    ContentBlock::Text {
                        text: constants::ai::TOOL_RESULTS_PREAMBLE.to_string(),
                    },
                );
            }

            messages.push(Message {
                role: match content.role {
                    Role::User => "user",
                    Role::Model => "assistant",
                },
                content: blocks,
            });
        }

        messages
    }

    fn convert_tools(&self, tools: &[ToolDeclaration]) -> Vec<Tool> {
        tools
            .iter()
            .map(|tool| Tool {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.parameters_or_empty(),
            })
            .collect()
    }
}

impl FormatHandler for AnthropicFormat {
    fn build_request_body(
        &self,
        request: &GenerateContentRequest,
        options: &RequestOptions,
    ) -> Result<Value> {
        require_model(options.model)?;

        // The host does not keep tool_use/tool_result pairs adjacent across
        // turns, so results are sent as Markdown text when flagged. This loses
        // the structured pairing on purpose.
        let contents = if options.capabilities.tool_results_as_text {
            render_tool_results_as_text(&request.contents)
        } else {
            request.contents.clone()
        };

        let config = &request.generation_config;
        let sampling = options.sampling;

        let body = MessagesRequest {
            model: options.model,
            messages: self.convert_messages(&contents, config.json_instruction()),
            max_tokens: config.max_output_tokens.unwrap_or(sampling.max_tokens),
            temperature: config.temperature.unwrap_or(sampling.temperature),
            top_p: config.top_p.unwrap_or(sampling.top_p),
            stream: options.streaming.then_some(true),
            tools: self.convert_tools(&request.tools),
        };

        Ok(serde_json::to_value(body)?)
    }

    fn parse_response(&self, body: &[u8]) -> Result<GenerateContentResponse> {
        let message: MessagesResponse = serde_json::from_slice(body)?;
        message.into_response()
    }

    fn stream_parser(&self) -> Box<dyn SseParser> {
        Box::new(AnthropicParser::new())
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        source: ImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: Map<String, Value>,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct Tool {
    name: String,
    description: String,
    input_schema: Value,
}

/// Token usage block shared by complete responses and stream events
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct AnthropicUsage {
    #[serde(default)]
    pub(crate) input_tokens: Option<u64>,
    #[serde(default)]
    pub(crate) output_tokens: Option<u64>,
}

impl AnthropicUsage {
    pub(crate) fn to_metadata(self) -> UsageMetadata {
        let input = self.input_tokens.unwrap_or(0);
        let output = self.output_tokens.unwrap_or(0);
        UsageMetadata::new(input, output, input + output)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Option<Vec<ResponseBlock>>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Option<Value>,
    },
    #[serde(other)]
    Unknown,
}

impl MessagesResponse {
    fn into_response(self) -> Result<GenerateContentResponse> {
        let blocks = self
            .content
            .filter(|blocks| !blocks.is_empty())
            .ok_or_else(|| AdapterError::Conversion("No content in response".to_string()))?;

        let mut text = String::new();
        let mut calls = Vec::new();
        for block in blocks {
            match block {
                ResponseBlock::Text { text: segment } => text.push_str(&segment),
                ResponseBlock::ToolUse { id, name, input } => {
                    calls.push(function_call_part(id, &name, parse_arguments(input.as_ref())))
                }
                ResponseBlock::Unknown => {}
            }
        }

        let mut parts = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            parts.push(Part::Text(text));
        }
        parts.extend(calls);

        Ok(GenerateContentResponse::from_parts(
            parts,
            Some(normalize_finish_reason(self.stop_reason.as_deref())),
            self.usage.map(AnthropicUsage::to_metadata).unwrap_or_default(),
        ))
    }
}
