//! Streaming API calls
//!
//! Opens an SSE response and exposes it as a lazy stream of normalized
//! frames. The response body is owned by the stream state, so it is released
//! whenever the stream is dropped, exhausted or cancelled.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Instant;

use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::core::HttpContentGenerator;
use crate::ai::generator::ResponseStream;
use crate::ai::sse::StreamReconciler;
use crate::ai::types::{GenerateContentRequest, GenerateContentResponse};
use crate::error::{AdapterError, Result};

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

struct StreamState {
    body: ByteStream,
    reconciler: StreamReconciler,
    pending: VecDeque<GenerateContentResponse>,
    cancel: CancellationToken,
    started: Instant,
    finished: bool,
}

impl HttpContentGenerator {
    /// Call the API with a streaming response
    pub(crate) async fn call_streaming(
        &self,
        request: &GenerateContentRequest,
        cancel: CancellationToken,
    ) -> Result<ResponseStream> {
        let started = Instant::now();
        let model = self.resolve_model(request);
        let body = self
            .format()
            .build_request_body(request, &self.request_options(model, true))?;
        let url = self.chat_url(model);

        info!(
            provider = self.provider_id().key(),
            model,
            turns = request.contents.len(),
            tools = request.tools.len(),
            "Opening stream"
        );

        let response = self.send(self.post_json(&url, &body), &cancel).await?;
        info!(
            status = response.status().as_u16(),
            elapsed = ?started.elapsed(),
            "Stream response headers received"
        );

        let state = StreamState {
            body: Box::pin(response.bytes_stream()),
            reconciler: StreamReconciler::new(self.format().stream_parser()),
            pending: VecDeque::new(),
            cancel,
            started,
            finished: false,
        };
        Ok(Box::pin(stream::unfold(state, next_frame)))
    }
}

/// Yield the next frame, reading more of the body as needed
///
/// Cancellation ends the stream without flushing open tool calls. A transport
/// error is yielded once, then the stream ends.
async fn next_frame(
    mut state: StreamState,
) -> Option<(Result<GenerateContentResponse>, StreamState)> {
    loop {
        if state.cancel.is_cancelled() {
            info!(elapsed = ?state.started.elapsed(), "Stream cancelled");
            return None;
        }
        if let Some(frame) = state.pending.pop_front() {
            return Some((Ok(frame), state));
        }
        if state.finished {
            return None;
        }

        let chunk = tokio::select! {
            biased;
            _ = state.cancel.cancelled() => continue,
            chunk = state.body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                let frames = state.reconciler.process_chunk(&bytes);
                state.pending.extend(frames);
                state.finished = state.reconciler.is_closed();
            }
            Some(Err(e)) => {
                error!(elapsed = ?state.started.elapsed(), "Stream read error: {}", e);
                state.finished = true;
                state.pending.clear();
                return Some((Err(AdapterError::from(e)), state));
            }
            None => {
                let frames = state.reconciler.finish();
                state.pending.extend(frames);
                state.finished = true;
                info!(elapsed = ?state.started.elapsed(), "Stream body complete");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::GeneratorConfig;
    use crate::ai::generator::ContentGenerator;
    use crate::ai::providers::ProviderId;
    use crate::ai::types::Content;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
    }

    async fn collect(stream: ResponseStream) -> Vec<GenerateContentResponse> {
        stream
            .map(|frame| frame.unwrap())
            .collect::<Vec<_>>()
            .await
    }

    #[tokio::test]
    async fn test_openai_stream_text_tools_and_usage() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Checking\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c1\",\"function\":{\"name\":\"get_weather\",\"arguments\":\"\"}}]}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"loc\"}}]}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"ation\\\":\\\"Paris\\\"}\"}}]}}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":3,\"total_tokens\":12}}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"stream": true, "stream_options": {"include_usage": true}})))
            .respond_with(sse(body))
            .expect(1)
            .mount(&server)
            .await;

        let generator = HttpContentGenerator::new(
            ProviderId::LmStudio,
            GeneratorConfig::new("qwen").with_base_url(server.uri()),
        )
        .unwrap();
        let request = GenerateContentRequest::new(vec![Content::user("What's the weather in Paris?")]);
        let frames = collect(
            generator
                .generate_content_stream(&request, CancellationToken::new())
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].text(), "Checking");
        assert!(frames[1].is_usage_only());
        assert_eq!(frames[1].usage_metadata.total_tokens, 12);
        let calls = frames[2].function_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id.as_deref(), Some("c1"));
        assert_eq!(calls[0].args["location"], "Paris");
        assert_eq!(frames[2].finish_reason(), Some("tool_calls"));
    }

    #[tokio::test]
    async fn test_anthropic_stream_flushes_on_close() {
        let server = MockServer::start().await;
        let body = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":20,\"output_tokens\":1}}}\n\n",
            "event: content_block_start\n",
            "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"tool_use\",\"id\":\"toolu_1\",\"name\":\"read-file\",\"input\":{}}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"path\\\":\\\"src/main.rs\\\"}\"}}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(sse(body))
            .mount(&server)
            .await;

        let generator = HttpContentGenerator::new(
            ProviderId::Anthropic,
            GeneratorConfig::new("claude-sonnet-4-20250514")
                .with_api_key("sk-ant")
                .with_base_url(server.uri()),
        )
        .unwrap();
        let request = GenerateContentRequest::new(vec![Content::user("Show main")]);
        let frames = collect(
            generator
                .generate_content_stream(&request, CancellationToken::new())
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].usage_metadata.prompt_tokens, 20);
        let calls = frames[1].function_calls();
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[0].args["absolute_path"], "src/main.rs");
    }

    #[tokio::test]
    async fn test_stream_http_error_before_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let generator = HttpContentGenerator::new(
            ProviderId::LocalLlm,
            GeneratorConfig::new("m").with_base_url(server.uri()),
        )
        .unwrap();
        let result = generator
            .generate_content_stream(
                &GenerateContentRequest::new(vec![Content::user("hi")]),
                CancellationToken::new(),
            )
            .await;
        match result {
            Err(err) => assert_eq!(err.status(), Some(429)),
            Ok(_) => panic!("Expected an HTTP error"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_stream_skips_tool_flush() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c1\",\"function\":{\"name\":\"get_weather\",\"arguments\":\"{\\\"loc\"}}]}}]}\n\n",
        );
        Mock::given(method("POST"))
            .respond_with(sse(body))
            .mount(&server)
            .await;

        let generator = HttpContentGenerator::new(
            ProviderId::LocalLlm,
            GeneratorConfig::new("m").with_base_url(server.uri()),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let mut stream = generator
            .generate_content_stream(
                &GenerateContentRequest::new(vec![Content::user("hi")]),
                cancel.clone(),
            )
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.text(), "Hi");

        cancel.cancel();
        let rest = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap();
        assert!(rest.is_none());
    }

    #[tokio::test]
    async fn test_cancel_before_response_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse("data: [DONE]\n\n").set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let generator = HttpContentGenerator::new(
            ProviderId::LocalLlm,
            GeneratorConfig::new("m").with_base_url(server.uri()),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = generator
            .generate_content_stream(&GenerateContentRequest::new(vec![Content::user("hi")]), cancel)
            .await;
        assert!(matches!(result, Err(AdapterError::Timeout(_))));
    }
}
