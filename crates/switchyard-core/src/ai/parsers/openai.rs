//! OpenAI-compatible SSE parser for chat/completions streams

use serde::Deserialize;

use crate::ai::format::openai::ChatUsage;
use crate::ai::sse::{SseEvent, SseParser};
use crate::ai::types::UsageMetadata;

/// OpenAI chat/completions stream parser
///
/// Parses chunks shaped like:
/// ```json
/// {"choices": [{"delta": {"content": "...", "tool_calls": [{"index": 0, "id": "...", "function": {"name": "...", "arguments": "..."}}]}}]}
/// ```
/// The `[DONE]` sentinel is handled by the reconciler before payloads get here.
#[derive(Debug, Default)]
pub struct OpenAIParser;

impl OpenAIParser {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Option<Vec<ChunkChoice>>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChunkToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChunkToolCall {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ChunkFunction>,
}

#[derive(Debug, Deserialize)]
struct ChunkFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

impl SseParser for OpenAIParser {
    fn parse_data(&self, data: &str) -> Result<Vec<SseEvent>, serde_json::Error> {
        let chunk: ChatChunk = serde_json::from_str(data)?;
        let mut events = Vec::new();

        let delta = chunk
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.delta);

        if let Some(delta) = delta {
            if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                events.push(SseEvent::TextDelta(text));
            }
            for call in delta.tool_calls.unwrap_or_default() {
                let Some(function) = call.function else {
                    continue;
                };
                events.push(SseEvent::ToolCallDelta {
                    index: call.index.unwrap_or(0),
                    id: call.id,
                    name: function.name,
                    delta: function.arguments.unwrap_or_default(),
                });
            }
        }

        if let Some(usage) = chunk.usage {
            events.push(SseEvent::Usage(UsageMetadata::from(usage)));
        }

        Ok(events)
    }
}
