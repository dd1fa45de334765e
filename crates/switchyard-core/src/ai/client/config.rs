//! Generator configuration
//!
//! Immutable per-generator settings, plus resolution from the environment.

use std::collections::HashMap;
use std::time::Duration;

use crate::ai::models;
use crate::ai::providers::ProviderId;
use crate::error::{AdapterError, Result};

/// Configuration owned by one content generator
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeneratorConfig {
    /// Model (or Azure deployment) used when a request does not name one
    pub model: String,
    pub api_key: Option<String>,
    /// Overrides the provider's default base URL
    pub base_url: Option<String>,
    /// Per-request deadline, covering the full response body
    pub timeout: Option<Duration>,
    /// Extra headers sent with every request, applied last
    pub custom_headers: HashMap<String, String>,
    /// Azure `api-version` query value
    pub api_version: Option<String>,
}

impl GeneratorConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Resolve configuration from process environment variables
    pub fn from_env(provider: ProviderId, requested_model: Option<&str>) -> Result<Self> {
        Self::from_lookup(provider, requested_model, |key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(provider: ProviderId, requested_model: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let requested = requested_model.filter(|m| !m.is_empty());

        let timeout = match get("CUSTOM_TIMEOUT") {
            Some(raw) => Some(Duration::from_millis(raw.trim().parse::<u64>().map_err(
                |_| AdapterError::Config(format!("CUSTOM_TIMEOUT must be milliseconds, got {:?}", raw)),
            )?)),
            None => None,
        };
        let custom_base_url = get("CUSTOM_BASE_URL");

        let mut config = GeneratorConfig {
            timeout,
            ..Default::default()
        };

        match provider {
            ProviderId::OpenAiCompatible => {
                config.api_key = Some(require(&get, "OPENAI_API_KEY", provider)?);
                config.base_url = custom_base_url;
                config.model = get("OPENAI_MODEL")
                    .or_else(|| requested.map(str::to_string))
                    .unwrap_or_else(|| "gpt-4o-mini".to_string());
            }
            ProviderId::Anthropic => {
                config.api_key = Some(require(&get, "ANTHROPIC_API_KEY", provider)?);
                let saved = get("ANTHROPIC_MODEL").filter(|m| models::validate_anthropic_model(m));
                config.model = requested
                    .filter(|m| models::validate_anthropic_model(m))
                    .map(str::to_string)
                    .or(saved)
                    .unwrap_or_else(|| models::default_anthropic_model().to_string());
            }
            ProviderId::LocalLlm => {
                config.api_key = get("LOCAL_LLM_API_KEY");
                config.base_url = custom_base_url;
                config.model = get("LOCAL_LLM_MODEL")
                    .or_else(|| requested.map(str::to_string))
                    .unwrap_or_else(|| "llama3.1:8b".to_string());
            }
            ProviderId::LmStudio => {
                config.base_url = custom_base_url;
                config.model = requested
                    .map(str::to_string)
                    .unwrap_or_else(|| models::default_lm_studio_model().to_string());
            }
            ProviderId::Azure => {
                config.api_key = Some(require(&get, "AZURE_API_KEY", provider)?);
                config.base_url = Some(require(&get, "AZURE_ENDPOINT_URL", provider)?);
                config.api_version = Some(require(&get, "AZURE_API_VERSION", provider)?);
                config.model = requested.map(str::to_string).ok_or_else(|| {
                    AdapterError::Config("Azure requires a model (deployment name)".to_string())
                })?;
            }
        }

        Ok(config)
    }
}

fn require<F>(get: &F, key: &str, provider: ProviderId) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    get(key).ok_or_else(|| {
        AdapterError::Config(format!(
            "{} environment variable is required for the {} provider",
            key,
            provider.key()
        ))
    })
}
