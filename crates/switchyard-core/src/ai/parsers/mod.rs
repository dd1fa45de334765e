//! SSE parser implementations for the supported wire formats

mod anthropic;
mod openai;

pub use anthropic::AnthropicParser;
pub use openai::OpenAIParser;
