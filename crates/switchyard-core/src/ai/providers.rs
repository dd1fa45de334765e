//! Built-in provider definitions
//!
//! Each built-in provider id maps to a static profile describing its wire
//! family, endpoints, authentication and sampling defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::constants;
use crate::error::AdapterError;

/// Built-in provider identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    OpenAiCompatible,
    LocalLlm,
    LmStudio,
    Anthropic,
    Azure,
}

impl ProviderId {
    pub fn all() -> &'static [ProviderId] {
        &[
            ProviderId::OpenAiCompatible,
            ProviderId::LocalLlm,
            ProviderId::LmStudio,
            ProviderId::Anthropic,
            ProviderId::Azure,
        ]
    }

    /// The string key hosts use to select this provider
    pub fn key(&self) -> &'static str {
        match self {
            ProviderId::OpenAiCompatible => "openai-compatible",
            ProviderId::LocalLlm => "local-llm",
            ProviderId::LmStudio => "lm-studio",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Azure => "azure",
        }
    }

    pub fn profile(&self) -> &'static ProviderProfile {
        // Every id has exactly one profile in BUILTIN_PROFILES
        BUILTIN_PROFILES
            .iter()
            .find(|p| p.id == *self)
            .unwrap_or(&BUILTIN_PROFILES[0])
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderId::OpenAiCompatible => write!(f, "OpenAI-compatible"),
            ProviderId::LocalLlm => write!(f, "Local LLM"),
            ProviderId::LmStudio => write!(f, "LM Studio"),
            ProviderId::Anthropic => write!(f, "Anthropic"),
            ProviderId::Azure => write!(f, "Azure OpenAI"),
        }
    }
}

impl FromStr for ProviderId {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderId::all()
            .iter()
            .copied()
            .find(|id| id.key() == s)
            .ok_or_else(|| AdapterError::UnsupportedProvider(s.to_string()))
    }
}

/// Wire format family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFormat {
    /// `/chat/completions` with `data: [DONE]` terminated streams
    OpenAI,
    /// `/v1/messages` with typed SSE events
    Anthropic,
}

/// How to send the API key in requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthHeader {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `x-api-key: <key>` plus `anthropic-version`
    XApiKey,
    /// `api-key: <key>` (Azure OpenAI)
    ApiKey,
}

/// Sampling values used when the request leaves them unset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingDefaults {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    /// Send zero frequency/presence penalties explicitly
    pub explicit_penalties: bool,
    /// Ask the server to append a usage chunk to streams
    pub stream_usage: bool,
}

impl Default for SamplingDefaults {
    fn default() -> Self {
        Self {
            temperature: constants::ai::DEFAULT_TEMPERATURE,
            top_p: constants::ai::DEFAULT_TOP_P,
            max_tokens: constants::ai::DEFAULT_MAX_TOKENS,
            explicit_penalties: false,
            stream_usage: false,
        }
    }
}

/// Static description of a built-in provider
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub id: ProviderId,
    pub api_format: ApiFormat,
    pub auth_header: AuthHeader,
    /// Base URL used when the config has none
    pub default_base_url: Option<&'static str>,
    /// Path appended to the base URL for chat requests
    pub chat_path: &'static str,
    /// Path appended to the base URL for embeddings
    pub embeddings_path: Option<&'static str>,
    /// Path appended to the base URL for model listing
    pub models_path: Option<&'static str>,
    /// Key that means "no real credential"; no auth header is sent for it
    pub placeholder_key: Option<&'static str>,
    /// Product token for the User-Agent header
    pub user_agent_product: &'static str,
    pub default_embedding_model: Option<&'static str>,
    pub sampling: SamplingDefaults,
}

static BUILTIN_PROFILES: LazyLock<Vec<ProviderProfile>> = LazyLock::new(|| {
    vec![
        ProviderProfile {
            id: ProviderId::OpenAiCompatible,
            api_format: ApiFormat::OpenAI,
            auth_header: AuthHeader::Bearer,
            default_base_url: Some("https://api.openai.com/v1"),
            chat_path: "/chat/completions",
            embeddings_path: Some("/embeddings"),
            models_path: Some("/models"),
            placeholder_key: None,
            user_agent_product: "AI-CLI-OpenAI",
            default_embedding_model: Some(constants::ai::DEFAULT_EMBEDDING_MODEL),
            sampling: SamplingDefaults::default(),
        },
        ProviderProfile {
            id: ProviderId::LocalLlm,
            api_format: ApiFormat::OpenAI,
            auth_header: AuthHeader::Bearer,
            default_base_url: Some("http://localhost:11434"),
            chat_path: "/v1/chat/completions",
            embeddings_path: Some("/v1/embeddings"),
            models_path: Some("/v1/models"),
            placeholder_key: Some("dummy-key"),
            user_agent_product: "AI-CLI-Local",
            default_embedding_model: Some(constants::ai::LOCAL_EMBEDDING_MODEL),
            sampling: SamplingDefaults::default(),
        },
        ProviderProfile {
            id: ProviderId::LmStudio,
            api_format: ApiFormat::OpenAI,
            auth_header: AuthHeader::Bearer,
            default_base_url: Some("http://127.0.0.1:1234"),
            chat_path: "/v1/chat/completions",
            embeddings_path: Some("/v1/embeddings"),
            models_path: Some("/v1/models"),
            placeholder_key: Some("lm-studio"),
            user_agent_product: "AI-CLI-LMStudio",
            default_embedding_model: Some(constants::ai::LOCAL_EMBEDDING_MODEL),
            sampling: SamplingDefaults {
                top_p: constants::ai::LM_STUDIO_TOP_P,
                explicit_penalties: true,
                stream_usage: true,
                ..SamplingDefaults::default()
            },
        },
        ProviderProfile {
            id: ProviderId::Anthropic,
            api_format: ApiFormat::Anthropic,
            auth_header: AuthHeader::XApiKey,
            default_base_url: Some("https://api.anthropic.com"),
            chat_path: "/v1/messages",
            embeddings_path: None,
            models_path: None,
            placeholder_key: None,
            user_agent_product: "AI-CLI-Anthropic",
            default_embedding_model: None,
            sampling: SamplingDefaults::default(),
        },
        ProviderProfile {
            id: ProviderId::Azure,
            api_format: ApiFormat::OpenAI,
            auth_header: AuthHeader::ApiKey,
            default_base_url: None,
            chat_path: "/chat/completions",
            embeddings_path: Some("/embeddings"),
            models_path: None,
            placeholder_key: None,
            user_agent_product: "AI-CLI-Azure",
            default_embedding_model: Some(constants::ai::DEFAULT_EMBEDDING_MODEL),
            sampling: SamplingDefaults::default(),
        },
    ]
});

/// All built-in provider profiles
pub fn builtin_profiles() -> &'static [ProviderProfile] {
    &BUILTIN_PROFILES
}

/// Per-backend behavior switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendCapabilities {
    /// Strip advanced JSON-Schema features from tool parameters
    pub simplify_tool_schemas: bool,
    /// Render tool results as a Markdown summary instead of structured blocks
    pub tool_results_as_text: bool,
}

impl BackendCapabilities {
    /// Capabilities for a provider talking to `base_url`
    pub fn for_provider(provider: ProviderId, base_url: &str) -> Self {
        match provider.profile().api_format {
            ApiFormat::OpenAI => Self {
                simplify_tool_schemas: base_url.contains("deepseek"),
                tool_results_as_text: false,
            },
            // Anthropic conversations built by the host do not keep tool_use /
            // tool_result pairs adjacent, which the Messages API rejects.
            ApiFormat::Anthropic => Self {
                simplify_tool_schemas: false,
                tool_results_as_text: true,
            },
        }
    }
}
