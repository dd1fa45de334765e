//! Non-streaming API calls
//!
//! Single request/response generation plus the auxiliary endpoints:
//! embeddings, model listing and the health check.

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::core::HttpContentGenerator;
use crate::ai::generator::{ConnectionStatus, ModelInfo};
use crate::ai::types::{
    joined_text, ContentEmbedding, EmbedContentRequest, EmbedContentResponse,
    GenerateContentRequest, GenerateContentResponse,
};
use crate::constants;
use crate::error::{AdapterError, Result};

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ModelListing {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

impl HttpContentGenerator {
    /// Call the API and wait for the complete response
    pub(crate) async fn call_simple(
        &self,
        request: &GenerateContentRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerateContentResponse> {
        let started = Instant::now();
        let model = self.resolve_model(request);
        let body = self
            .format()
            .build_request_body(request, &self.request_options(model, false))?;
        let url = self.chat_url(model);

        info!(
            provider = self.provider_id().key(),
            model,
            turns = request.contents.len(),
            tools = request.tools.len(),
            "Sending generate request"
        );

        let response = self.send(self.post_json(&url, &body), cancel).await?;
        let status = response.status();
        let bytes = self.read_body(response, cancel).await?;
        debug!(status = status.as_u16(), bytes = bytes.len(), "Response body received");

        let parsed = self.format().parse_response(&bytes)?;
        info!(
            elapsed = ?started.elapsed(),
            finish_reason = parsed.finish_reason().unwrap_or("none"),
            function_calls = parsed.function_calls().len(),
            total_tokens = parsed.usage_metadata.total_tokens,
            "Generate request complete"
        );
        Ok(parsed)
    }

    /// POST the joined text of every turn to the embeddings endpoint
    pub(crate) async fn call_embeddings(
        &self,
        request: &EmbedContentRequest,
    ) -> Result<EmbedContentResponse> {
        let profile = self.profile();
        let model = request
            .model
            .as_deref()
            .filter(|m| !m.is_empty())
            .or(profile.default_embedding_model)
            .unwrap_or(constants::ai::DEFAULT_EMBEDDING_MODEL);
        let url = self.embeddings_url(model).ok_or_else(|| {
            AdapterError::UnsupportedOperation(format!(
                "{} does not provide an embeddings endpoint",
                self.provider_id()
            ))
        })?;

        let body = json!({
            "input": joined_text(&request.contents),
            "model": model,
        });
        info!(provider = self.provider_id().key(), model, "Sending embeddings request");

        let cancel = CancellationToken::new();
        let response = self.send(self.post_json(&url, &body), &cancel).await?;
        let bytes = self.read_body(response, &cancel).await?;
        let parsed: EmbeddingsResponse = serde_json::from_slice(&bytes)?;

        if parsed.data.is_empty() {
            return Err(AdapterError::Conversion("No embeddings in response".to_string()));
        }
        Ok(EmbedContentResponse {
            embeddings: parsed
                .data
                .into_iter()
                .map(|d| ContentEmbedding { values: d.embedding })
                .collect(),
        })
    }

    /// GET the models endpoint
    pub(crate) async fn fetch_models(&self, timeout: Duration) -> Result<Vec<ModelInfo>> {
        let url = self.models_url().ok_or_else(|| {
            AdapterError::UnsupportedOperation(format!(
                "{} does not provide a models endpoint",
                self.provider_id()
            ))
        })?;

        let cancel = CancellationToken::new();
        let response = self.send(self.get(&url, timeout), &cancel).await?;
        let bytes = self.read_body(response, &cancel).await?;
        let listing: ModelListing = serde_json::from_slice(&bytes)?;
        debug!(count = listing.data.len(), "Models listed");
        Ok(listing.data)
    }

    /// Health check: the server answers and has at least one model loaded
    pub(crate) async fn check_connection(&self) -> Result<ConnectionStatus> {
        let models = self
            .fetch_models(constants::http::HEALTH_CHECK_TIMEOUT)
            .await
            .map_err(|err| match err {
                AdapterError::Timeout(_) => AdapterError::Timeout(format!(
                    "{} connection timeout - ensure it is running on port {}",
                    self.provider_id(),
                    self.port_hint()
                )),
                other => other,
            })?;

        if models.is_empty() {
            warn!(provider = self.provider_id().key(), "Server reachable but no models loaded");
            return Err(AdapterError::Config(format!(
                "{} is running but no models are loaded",
                self.provider_id()
            )));
        }

        let status = ConnectionStatus {
            models_available: models.len(),
            loaded_models: models.into_iter().map(|m| m.id).collect(),
        };
        info!(
            provider = self.provider_id().key(),
            models = status.models_available,
            "Connection validated"
        );
        Ok(status)
    }
}
