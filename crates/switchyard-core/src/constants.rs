//! Application constants and configuration defaults
//!
//! Centralized location for magic numbers and default values

use std::time::Duration;

/// HTTP client configuration
pub mod http {
    use super::*;

    /// Connection timeout for HTTP requests
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default request timeout for LM Studio (local inference can be slow to start)
    pub const LM_STUDIO_TIMEOUT: Duration = Duration::from_secs(30);

    /// Health check timeout for `validate_connection`
    pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

    /// Timeout for model listing
    pub const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(10);

    /// Anthropic API version header value
    pub const ANTHROPIC_VERSION: &str = "2023-06-01";
}

/// Request defaults applied when the normalized request leaves a value unset
pub mod ai {
    /// Default sampling temperature
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;

    /// Default nucleus sampling value
    pub const DEFAULT_TOP_P: f32 = 1.0;

    /// LM Studio prefers a more conservative top_p for MLX models
    pub const LM_STUDIO_TOP_P: f32 = 0.9;

    /// Default maximum output tokens
    pub const DEFAULT_MAX_TOKENS: u32 = 2048;

    /// Characters per token used by the approximate token counter
    pub const CHARS_PER_TOKEN: usize = 4;

    /// Default embedding model for hosted OpenAI-compatible APIs
    pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

    /// Default embedding model for local servers
    pub const LOCAL_EMBEDDING_MODEL: &str = "nomic-embed-text";

    /// Instruction injected when JSON output is requested with a schema
    pub const JSON_MODE_INSTRUCTION: &str = "You must respond with valid JSON only. No additional text, explanations, or formatting. The response must conform to this schema: ";

    /// Text injected into user turns that would otherwise only hold tool results
    pub const TOOL_RESULTS_PREAMBLE: &str = "Here are the tool results:";
}

/// Tool discovery limits
pub mod discovery {
    /// Maximum bytes read from the discovery command's stdout
    pub const MAX_STDOUT_BYTES: usize = 10 * 1024 * 1024;

    /// Maximum bytes read from the discovery command's stderr
    pub const MAX_STDERR_BYTES: usize = 10 * 1024 * 1024;
}
