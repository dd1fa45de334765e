//! HTTP content generator
//!
//! One `HttpContentGenerator` serves every built-in provider. The provider's
//! profile decides the wire format, endpoints and authentication; requests are
//! routed through the matching format handler.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::config::GeneratorConfig;
use crate::ai::format::{get_format_handler, FormatHandler, RequestOptions};
use crate::ai::generator::{ConnectionStatus, ContentGenerator, ModelInfo, ResponseStream};
use crate::ai::providers::{ApiFormat, AuthHeader, BackendCapabilities, ProviderId, ProviderProfile};
use crate::ai::types::{
    EmbedContentRequest, EmbedContentResponse, GenerateContentRequest, GenerateContentResponse,
};
use crate::constants;
use crate::error::{AdapterError, Result};

/// Content generator speaking a provider's HTTP API
pub struct HttpContentGenerator {
    http: Client,
    provider: ProviderId,
    config: GeneratorConfig,
    base_url: String,
    custom_headers: HeaderMap,
    format: Box<dyn FormatHandler>,
    capabilities: BackendCapabilities,
}

impl HttpContentGenerator {
    pub fn new(provider: ProviderId, config: GeneratorConfig) -> Result<Self> {
        let profile = provider.profile();
        let base_url = config
            .base_url
            .as_deref()
            .or(profile.default_base_url)
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| AdapterError::Config(format!("{} requires a base URL", provider)))?;

        if provider == ProviderId::Azure && config.api_version.is_none() {
            return Err(AdapterError::Config(
                "Azure OpenAI requires an api-version".to_string(),
            ));
        }

        let custom_headers = parse_custom_headers(&config)?;
        let capabilities = BackendCapabilities::for_provider(provider, &base_url);

        info!(
            provider = provider.key(),
            base_url = %base_url,
            model = %config.model,
            simplify_tool_schemas = capabilities.simplify_tool_schemas,
            tool_results_as_text = capabilities.tool_results_as_text,
            "Content generator created"
        );

        Ok(Self {
            http: Self::create_http_client(profile),
            provider,
            config,
            base_url,
            custom_headers,
            format: get_format_handler(profile.api_format),
            capabilities,
        })
    }

    /// HTTP client with a provider User-Agent and connect timeout
    ///
    /// The overall deadline is set per request since it comes from the config.
    fn create_http_client(profile: &ProviderProfile) -> Client {
        let user_agent = format!(
            "{}/{} ({}; {})",
            profile.user_agent_product,
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        Client::builder()
            .user_agent(user_agent)
            .connect_timeout(constants::http::CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                error!("Failed to build HTTP client: {}. Using default client.", e);
                Client::new()
            })
    }

    pub fn provider_id(&self) -> ProviderId {
        self.provider
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    pub(crate) fn profile(&self) -> &'static ProviderProfile {
        self.provider.profile()
    }

    pub(crate) fn format(&self) -> &dyn FormatHandler {
        self.format.as_ref()
    }

    /// Config timeout, else the provider's default (LM Studio only)
    pub(crate) fn request_timeout(&self) -> Option<Duration> {
        self.config.timeout.or_else(|| {
            (self.provider == ProviderId::LmStudio).then_some(constants::http::LM_STUDIO_TIMEOUT)
        })
    }

    /// The request's model, else the configured one
    pub(crate) fn resolve_model<'a>(&'a self, request: &'a GenerateContentRequest) -> &'a str {
        request
            .model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.config.model)
    }

    pub(crate) fn request_options<'a>(&'a self, model: &'a str, streaming: bool) -> RequestOptions<'a> {
        RequestOptions {
            model,
            streaming,
            sampling: &self.profile().sampling,
            capabilities: self.capabilities,
        }
    }

    pub(crate) fn chat_url(&self, model: &str) -> String {
        match self.provider {
            ProviderId::Azure => self.azure_url(model, "chat/completions"),
            _ => format!("{}{}", self.base_url, self.profile().chat_path),
        }
    }

    pub(crate) fn embeddings_url(&self, model: &str) -> Option<String> {
        let path = self.profile().embeddings_path?;
        Some(match self.provider {
            ProviderId::Azure => self.azure_url(model, "embeddings"),
            _ => format!("{}{}", self.base_url, path),
        })
    }

    pub(crate) fn models_url(&self) -> Option<String> {
        self.profile()
            .models_path
            .map(|path| format!("{}{}", self.base_url, path))
    }

    fn azure_url(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.base_url,
            deployment,
            operation,
            self.config.api_version.as_deref().unwrap_or_default()
        )
    }

    /// Port the backend is expected on, for diagnostics
    pub(crate) fn port_hint(&self) -> String {
        reqwest::Url::parse(&self.base_url)
            .ok()
            .and_then(|url| url.port_or_known_default())
            .map(|port| port.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Attach authentication, protocol and custom headers
    ///
    /// Placeholder keys used by local servers are never sent.
    pub(crate) fn authorize(&self, mut request: RequestBuilder) -> RequestBuilder {
        let profile = self.profile();
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty() && Some(*key) != profile.placeholder_key);

        if let Some(key) = key {
            request = match profile.auth_header {
                AuthHeader::Bearer => request.bearer_auth(key),
                AuthHeader::XApiKey => request.header("x-api-key", key),
                AuthHeader::ApiKey => request.header("api-key", key),
            };
        } else {
            debug!(provider = self.provider.key(), "Sending request without credentials");
        }

        if profile.api_format == ApiFormat::Anthropic {
            request = request.header("anthropic-version", constants::http::ANTHROPIC_VERSION);
        }

        // Replaces any built-in header of the same name
        request.headers(self.custom_headers.clone())
    }

    /// Authorized JSON POST carrying the configured deadline
    pub(crate) fn post_json(&self, url: &str, body: &Value) -> RequestBuilder {
        let request = self.authorize(self.http.post(url)).json(body);
        match self.request_timeout() {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    pub(crate) fn get(&self, url: &str, timeout: Duration) -> RequestBuilder {
        self.authorize(self.http.get(url)).timeout(timeout)
    }

    /// Send a request, racing it against the cancellation token
    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(aborted()),
            result = request.send() => result?,
        };
        self.handle_error_response(response).await
    }

    /// Read a full response body, racing it against the cancellation token
    pub(crate) async fn read_body(
        &self,
        response: Response,
        cancel: &CancellationToken,
    ) -> Result<bytes::Bytes> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(aborted()),
            body = response.bytes() => Ok(body?),
        }
    }

    /// Turn a non-2xx response into an `Http` error carrying the body
    pub(crate) async fn handle_error_response(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!(
            provider = self.provider.key(),
            status = status.as_u16(),
            body = %body,
            "API error response"
        );
        Err(AdapterError::http(self.provider, status.as_u16(), body))
    }
}

pub(crate) fn aborted() -> AdapterError {
    AdapterError::Timeout("request aborted".to_string())
}

fn parse_custom_headers(config: &GeneratorConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.custom_headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| AdapterError::Config(format!("invalid header name: {}", name)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| AdapterError::Config(format!("invalid value for header {}", name)))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

#[async_trait]
impl ContentGenerator for HttpContentGenerator {
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerateContentResponse> {
        self.call_simple(request, cancel).await
    }

    async fn generate_content_stream(
        &self,
        request: &GenerateContentRequest,
        cancel: CancellationToken,
    ) -> Result<ResponseStream> {
        self.call_streaming(request, cancel).await
    }

    async fn embed_content(&self, request: &EmbedContentRequest) -> Result<EmbedContentResponse> {
        self.call_embeddings(request).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.fetch_models(constants::http::LIST_MODELS_TIMEOUT).await
    }

    async fn validate_connection(&self) -> Result<ConnectionStatus> {
        self.check_connection().await
    }
}
