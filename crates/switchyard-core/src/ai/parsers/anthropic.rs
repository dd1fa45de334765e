//! Anthropic SSE parser for Messages API streams

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::ai::format::anthropic::AnthropicUsage;
use crate::ai::sse::{SseEvent, SseParser};
use crate::ai::types::UsageMetadata;

/// Anthropic Messages stream parser
///
/// Handles the typed events `message_start`, `content_block_start`,
/// `content_block_delta` (`text_delta`, `input_json_delta`) and
/// `message_delta`. Other event types are skipped; the stream ends when the
/// transport closes.
#[derive(Debug, Default)]
pub struct AnthropicParser;

impl AnthropicParser {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart {
        #[serde(default)]
        message: Option<StartMessage>,
    },
    ContentBlockStart {
        #[serde(default)]
        index: usize,
        content_block: StartBlock,
    },
    ContentBlockDelta {
        #[serde(default)]
        index: usize,
        delta: BlockDelta,
    },
    MessageDelta {
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    Error {
        #[serde(default)]
        error: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StartMessage {
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StartBlock {
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        #[serde(default)]
        text: String,
    },
    InputJsonDelta {
        #[serde(default)]
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

impl SseParser for AnthropicParser {
    fn parse_data(&self, data: &str) -> Result<Vec<SseEvent>, serde_json::Error> {
        let event = match serde_json::from_str::<StreamEvent>(data)? {
            StreamEvent::MessageStart { message } => match message.and_then(|m| m.usage) {
                Some(usage) => SseEvent::Usage(usage.to_metadata()),
                None => SseEvent::Skip,
            },
            StreamEvent::ContentBlockStart {
                index,
                content_block: StartBlock::ToolUse { id, name },
            } => SseEvent::ToolCallStart { index, id, name },
            StreamEvent::ContentBlockStart { .. } => SseEvent::Skip,
            StreamEvent::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } => SseEvent::TextDelta(text),
                BlockDelta::InputJsonDelta { partial_json } => SseEvent::ToolCallDelta {
                    index,
                    id: None,
                    name: None,
                    delta: partial_json,
                },
                BlockDelta::Other => SseEvent::Skip,
            },
            // Incremental usage: only output tokens are reported here
            StreamEvent::MessageDelta { usage: Some(usage) } => {
                let output = usage.output_tokens.unwrap_or(0);
                SseEvent::Usage(UsageMetadata::new(0, output, output))
            }
            StreamEvent::MessageDelta { usage: None } => SseEvent::Skip,
            StreamEvent::Error { error } => {
                warn!(error = %error, "Anthropic stream reported an error event");
                SseEvent::Skip
            }
            StreamEvent::Other => SseEvent::Skip,
        };
        Ok(vec![event])
    }
}
