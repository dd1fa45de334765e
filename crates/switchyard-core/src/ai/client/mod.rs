//! HTTP client for the built-in providers
//!
//! One generator type covers every provider; the provider profile picks the
//! format handler:
//! - OpenAI chat/completions (openai-compatible, local-llm, lm-studio, azure)
//! - Anthropic messages

pub mod config;
pub mod core;
pub mod simple;
pub mod streaming;

pub use config::GeneratorConfig;
pub use core::HttpContentGenerator;
