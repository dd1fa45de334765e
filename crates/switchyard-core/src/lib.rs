//! Switchyard Core - request translation for multiple LLM backends
//!
//! This crate provides:
//! - A normalized content model shared by every backend
//! - OpenAI-compatible and Anthropic format converters
//! - Streaming reconciliation of SSE responses, including tool-call assembly
//! - A generator registry with runtime registration
//! - Tool name normalization, tool discovery and schema sanitizing

pub mod ai;
pub mod constants;
pub mod error;
pub mod tools;

// Re-exports for convenience
pub use ai::client::{GeneratorConfig, HttpContentGenerator};
pub use ai::generator::{ContentGenerator, ResponseStream};
pub use ai::providers::ProviderId;
pub use ai::registry::{create_content_generator, register_generator};
pub use ai::types::{Content, GenerateContentRequest, GenerateContentResponse, Part, Role};
pub use error::{AdapterError, Result};
pub use tools::ToolCatalog;
