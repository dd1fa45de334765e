//! Adapter error types

use thiserror::Error;

use crate::ai::providers::ProviderId;

/// Errors surfaced by content generators, the registry and tool discovery
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Backend unreachable (DNS failure, connection refused, broken body stream)
    #[error("network error: {0}")]
    Network(String),

    /// Deadline exceeded or request aborted
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Non-2xx response
    #[error("{guidance} (HTTP {status})")]
    Http {
        status: u16,
        body: String,
        guidance: String,
    },

    /// Structurally empty or unparsable wire payload
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Unknown provider id
    #[error("no content generator available for provider: {0}")]
    UnsupportedProvider(String),

    /// Operation has no backend equivalent
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Missing or invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Tool discovery subprocess failed
    #[error("tool discovery failed: {0}")]
    Discovery(String),
}

impl AdapterError {
    /// Stable error kind name
    pub fn code(&self) -> &'static str {
        match self {
            AdapterError::Network(_) => "NetworkError",
            AdapterError::Timeout(_) => "TimeoutError",
            AdapterError::Http { .. } => "HttpError",
            AdapterError::Conversion(_) => "ConversionError",
            AdapterError::UnsupportedProvider(_) => "UnsupportedProviderError",
            AdapterError::UnsupportedOperation(_) => "UnsupportedOperationError",
            AdapterError::Config(_) => "ConfigError",
            AdapterError::Discovery(_) => "DiscoveryError",
        }
    }

    /// Build an HTTP error with provider-specific guidance attached
    pub fn http(provider: ProviderId, status: u16, body: impl Into<String>) -> Self {
        AdapterError::Http {
            status,
            body: body.into(),
            guidance: http_guidance(provider, status),
        }
    }

    /// True for network, timeout and HTTP failures
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AdapterError::Network(_) | AdapterError::Timeout(_) | AdapterError::Http { .. }
        )
    }

    /// HTTP status when this is an HTTP error
    pub fn status(&self) -> Option<u16> {
        match self {
            AdapterError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout(err.to_string())
        } else if err.is_decode() {
            AdapterError::Conversion(err.to_string())
        } else if let Some(status) = err.status() {
            AdapterError::Http {
                status: status.as_u16(),
                body: String::new(),
                guidance: format!("HTTP {}", status),
            }
        } else {
            AdapterError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Conversion(err.to_string())
    }
}

/// Human-readable guidance for a failed status code
pub fn http_guidance(provider: ProviderId, status: u16) -> String {
    if provider == ProviderId::LmStudio {
        match status {
            404 => {
                return "LM Studio model not found or not loaded. Ensure LM Studio is running, \
                        a model is loaded, and the model supports the OpenAI API format"
                    .to_string()
            }
            503 => {
                return "LM Studio service unavailable. The model might be loading or the \
                        server is overloaded"
                    .to_string()
            }
            400 => {
                return "LM Studio bad request. Check if the model supports function calling \
                        (tools) if you're using CLI tools"
                    .to_string()
            }
            _ => {}
        }
    }

    match status {
        401 => format!("Invalid API key. Please check your {} API key.", provider),
        403 => "Access denied. Your API key may not have the required permissions.".to_string(),
        429 => "Rate limit exceeded. Please try again later.".to_string(),
        400 => "Bad request. Please check your input parameters.".to_string(),
        s if s >= 500 => format!("{} server error. Please try again later.", provider),
        s => format!("{} request failed with HTTP {}", provider, s),
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, AdapterError>;
