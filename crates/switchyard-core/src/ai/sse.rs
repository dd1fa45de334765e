//! SSE (Server-Sent Events) stream reconciliation
//!
//! Turns the raw byte chunks of a streaming response into normalized
//! response frames. Lines are reassembled across chunk boundaries, each
//! `data:` payload is handed to a provider-specific [`SseParser`], and tool
//! calls streamed in pieces are accumulated until the stream ends.

use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::format::{function_call_part, parse_argument_text};
use super::types::{GenerateContentResponse, Part, UsageMetadata};

/// End-of-stream sentinel used by OpenAI-compatible servers
const DONE_MARKER: &str = "[DONE]";

/// Events that can be parsed from SSE data
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    TextDelta(String),
    /// A tool call begins at a stream position
    ToolCallStart {
        index: usize,
        id: Option<String>,
        name: String,
    },
    /// More of a tool call: argument text, and possibly its id or name
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        delta: String,
    },
    Usage(UsageMetadata),
    Skip,
}

/// Trait for provider-specific SSE parsing logic
pub trait SseParser: Send {
    /// Parse one `data:` payload into zero or more events
    fn parse_data(&self, data: &str) -> Result<Vec<SseEvent>, serde_json::Error>;
}

/// Tool call being assembled from streamed fragments
#[derive(Debug, Clone)]
pub struct ToolCallAccumulator {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallAccumulator {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            arguments: String::new(),
        }
    }

    pub fn add_arguments(&mut self, delta: &str) {
        self.arguments.push_str(delta);
    }

    /// Finished call part. Unparsable arguments become an empty mapping.
    pub fn complete(&self) -> Part {
        function_call_part(
            Some(self.id.clone()),
            &self.name,
            parse_argument_text(&self.arguments),
        )
    }
}

/// Per-request streaming state machine
///
/// Open until the `[DONE]` sentinel is seen or [`finish`](Self::finish) is
/// called for transport completion; both flush the pending tool calls once.
pub struct StreamReconciler {
    parser: Box<dyn SseParser>,
    /// Bytes of a line not yet terminated by `\n`
    partial_line: Vec<u8>,
    /// Accumulators in first-seen order
    tool_calls: Vec<ToolCallAccumulator>,
    /// Accumulator key to position in `tool_calls`
    positions: HashMap<String, usize>,
    /// Stream index to the id bound to it
    index_ids: HashMap<usize, String>,
    closed: bool,
    stream_start: Instant,
    event_count: usize,
    bytes_received: usize,
}

impl StreamReconciler {
    pub fn new(parser: Box<dyn SseParser>) -> Self {
        debug!("SSE stream reconciler created");
        Self {
            parser,
            partial_line: Vec::new(),
            tool_calls: Vec::new(),
            positions: HashMap::new(),
            index_ids: HashMap::new(),
            closed: false,
            stream_start: Instant::now(),
            event_count: 0,
            bytes_received: 0,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Process a chunk of bytes, returning the frames it completes
    pub fn process_chunk(&mut self, bytes: &[u8]) -> Vec<GenerateContentResponse> {
        let mut frames = Vec::new();
        if self.closed {
            return frames;
        }

        self.bytes_received += bytes.len();
        self.partial_line.extend_from_slice(bytes);

        // '\n' never occurs inside a multi-byte UTF-8 sequence, so splitting
        // on the raw byte keeps characters that straddle chunks intact.
        while let Some(newline) = self.partial_line.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.partial_line.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line[..newline]);
            self.process_line(line.trim_end_matches('\r'), &mut frames);
            if self.closed {
                self.partial_line.clear();
                break;
            }
        }

        frames
    }

    /// Transport completion: process any unterminated line, then flush
    pub fn finish(&mut self) -> Vec<GenerateContentResponse> {
        let mut frames = Vec::new();
        if self.closed {
            return frames;
        }

        if !self.partial_line.is_empty() {
            let line = std::mem::take(&mut self.partial_line);
            let line = String::from_utf8_lossy(&line).into_owned();
            self.process_line(line.trim_end_matches('\r'), &mut frames);
        }

        if !self.closed {
            self.close(&mut frames);
        }
        frames
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<GenerateContentResponse>) {
        // Blank separators, comments and `event:` names carry nothing we need
        if line.is_empty() || line.starts_with(':') {
            return;
        }
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.strip_prefix(' ').unwrap_or(data);
        self.process_data(data, frames);
    }

    fn process_data(&mut self, data: &str, frames: &mut Vec<GenerateContentResponse>) {
        self.event_count += 1;

        if data.trim() == DONE_MARKER {
            info!(
                elapsed = ?self.stream_start.elapsed(),
                events = self.event_count,
                bytes = self.bytes_received,
                "SSE [DONE] marker received"
            );
            self.close(frames);
            return;
        }
        if data.trim().is_empty() {
            return;
        }

        match self.parser.parse_data(data) {
            Ok(events) => {
                for event in events {
                    self.apply_event(event, frames);
                }
            }
            Err(e) => {
                warn!(event = self.event_count, error = %e, "Skipping unparsable SSE payload");
            }
        }
    }

    fn apply_event(&mut self, event: SseEvent, frames: &mut Vec<GenerateContentResponse>) {
        match event {
            SseEvent::TextDelta(text) => {
                if !text.is_empty() {
                    frames.push(GenerateContentResponse::from_parts(
                        vec![Part::Text(text)],
                        None,
                        UsageMetadata::default(),
                    ));
                }
            }
            SseEvent::ToolCallStart { index, id, name } => {
                let position = self.accumulator_for(index, id, &name);
                let call = &mut self.tool_calls[position];
                if !name.is_empty() {
                    call.name = name;
                }
            }
            SseEvent::ToolCallDelta {
                index,
                id,
                name,
                delta,
            } => {
                let position = self.accumulator_for(index, id, name.as_deref().unwrap_or(""));
                let call = &mut self.tool_calls[position];
                if let Some(name) = name.filter(|n| !n.is_empty()) {
                    call.name = name;
                }
                call.add_arguments(&delta);
            }
            SseEvent::Usage(usage) => {
                debug!(
                    prompt = usage.prompt_tokens,
                    completion = usage.completion_tokens,
                    total = usage.total_tokens,
                    "SSE usage"
                );
                frames.push(GenerateContentResponse::usage_only(usage));
            }
            SseEvent::Skip => {}
        }
    }

    /// Position of the accumulator an event refers to, creating it on first
    /// sight. An explicit id wins and binds the index; otherwise the id bound
    /// to the index is used, falling back to `call_{index}`.
    fn accumulator_for(&mut self, index: usize, id: Option<String>, name: &str) -> usize {
        let key = match id {
            Some(id) if !id.is_empty() => {
                self.index_ids.insert(index, id.clone());
                id
            }
            _ => self
                .index_ids
                .get(&index)
                .cloned()
                .unwrap_or_else(|| format!("call_{}", index)),
        };

        if let Some(position) = self.positions.get(&key) {
            return *position;
        }

        info!(id = %key, name = %name, index, "Tool call started");
        self.tool_calls
            .push(ToolCallAccumulator::new(key.clone(), name.to_string()));
        let position = self.tool_calls.len() - 1;
        self.positions.insert(key, position);
        position
    }

    fn close(&mut self, frames: &mut Vec<GenerateContentResponse>) {
        self.closed = true;
        if let Some(frame) = self.flush() {
            frames.push(frame);
        }
        info!(
            elapsed = ?self.stream_start.elapsed(),
            events = self.event_count,
            bytes = self.bytes_received,
            "SSE stream closed"
        );
    }

    fn flush(&mut self) -> Option<GenerateContentResponse> {
        if self.tool_calls.is_empty() {
            return None;
        }
        let parts: Vec<Part> = self
            .tool_calls
            .drain(..)
            .map(|call| call.complete())
            .collect();
        self.positions.clear();
        self.index_ids.clear();

        info!(count = parts.len(), "Flushing accumulated tool calls");
        Some(GenerateContentResponse::from_parts(
            parts,
            Some("tool_calls".to_string()),
            UsageMetadata::default(),
        ))
    }
}
