//! The content generation capability set shared by every backend

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::types::{
    approximate_token_count, CountTokensRequest, CountTokensResponse, EmbedContentRequest,
    EmbedContentResponse, GenerateContentRequest, GenerateContentResponse,
};
use crate::error::{AdapterError, Result};

/// Lazy, forward-only sequence of normalized partial responses
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<GenerateContentResponse>> + Send>>;

/// A model advertised by a backend's model listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default = "default_owner")]
    pub owned_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
}

fn default_owner() -> String {
    "local".to_string()
}

/// Result of a successful health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub models_available: usize,
    pub loaded_models: Vec<String>,
}

/// Content generation against one configured backend
///
/// Cancelling the token aborts the in-flight call with a `Timeout` error.
/// For streams, cancellation ends the sequence without the final tool-call
/// flush.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerateContentResponse>;

    async fn generate_content_stream(
        &self,
        request: &GenerateContentRequest,
        cancel: CancellationToken,
    ) -> Result<ResponseStream>;

    /// Approximates the count as `ceil(chars / 4)`; none of the supported
    /// backends expose a tokenizer endpoint.
    async fn count_tokens(&self, request: &CountTokensRequest) -> Result<CountTokensResponse> {
        Ok(CountTokensResponse {
            total_tokens: approximate_token_count(&request.contents),
        })
    }

    async fn embed_content(&self, _request: &EmbedContentRequest) -> Result<EmbedContentResponse> {
        Err(AdapterError::UnsupportedOperation(
            "embeddings are not available for this backend".to_string(),
        ))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Err(AdapterError::UnsupportedOperation(
            "model listing is not available for this backend".to_string(),
        ))
    }

    async fn validate_connection(&self) -> Result<ConnectionStatus> {
        Err(AdapterError::UnsupportedOperation(
            "connection validation is not available for this backend".to_string(),
        ))
    }
}
