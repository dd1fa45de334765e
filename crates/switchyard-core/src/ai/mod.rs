//! AI provider layer
//!
//! Translates normalized requests into OpenAI-compatible and Anthropic wire
//! formats, and reconciles their responses and streams back into one
//! normalized response model.

pub mod client;
pub mod format;
pub mod generator;
pub mod models;
pub mod normalize;
pub mod parsers;
pub mod providers;
pub mod registry;
pub mod sse;
pub mod types;

pub use client::{GeneratorConfig, HttpContentGenerator};
pub use generator::{ConnectionStatus, ContentGenerator, ModelInfo, ResponseStream};
pub use registry::{create_content_generator, register_generator, reset_registry};
