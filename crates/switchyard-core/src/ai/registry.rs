//! Generator registry
//!
//! Maps provider ids to content generators. Built-in ids always resolve to
//! [`HttpContentGenerator`]; any other id is looked up in a process-wide table
//! that hosts and plugins populate at startup with [`register_generator`].

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{info, warn};

use super::client::{GeneratorConfig, HttpContentGenerator};
use super::generator::ContentGenerator;
use super::providers::ProviderId;
use crate::error::{AdapterError, Result};

/// Constructor for an externally supplied provider
pub type GeneratorFactory =
    Arc<dyn Fn(GeneratorConfig) -> Result<Box<dyn ContentGenerator>> + Send + Sync>;

/// Process-wide table of externally registered providers
///
/// Lives for the whole process; tests clear it with [`reset_registry`].
static REGISTRY: Lazy<RwLock<HashMap<String, GeneratorFactory>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Build a content generator for `provider_id`
pub fn create_content_generator(
    provider_id: &str,
    config: GeneratorConfig,
) -> Result<Box<dyn ContentGenerator>> {
    if let Ok(builtin) = provider_id.parse::<ProviderId>() {
        return Ok(Box::new(HttpContentGenerator::new(builtin, config)?));
    }

    // Clone the factory out so the lock is not held while it runs
    let factory = REGISTRY.read().get(provider_id).cloned();
    match factory {
        Some(factory) => {
            info!(provider = provider_id, "Creating registered content generator");
            factory(config)
        }
        None => Err(AdapterError::UnsupportedProvider(provider_id.to_string())),
    }
}

/// Register a provider; the last registration for an id wins
pub fn register_generator<F>(provider_id: impl Into<String>, factory: F)
where
    F: Fn(GeneratorConfig) -> Result<Box<dyn ContentGenerator>> + Send + Sync + 'static,
{
    let provider_id = provider_id.into();
    if provider_id.parse::<ProviderId>().is_ok() {
        warn!(provider = %provider_id, "Registered provider is shadowed by the built-in of the same id");
    }

    let previous = REGISTRY
        .write()
        .insert(provider_id.clone(), Arc::new(factory));
    if previous.is_some() {
        warn!(provider = %provider_id, "Overwriting registered content generator");
    } else {
        info!(provider = %provider_id, "Registered content generator");
    }
}

/// Ids of every externally registered provider, sorted
pub fn registered_providers() -> Vec<String> {
    let mut ids: Vec<String> = REGISTRY.read().keys().cloned().collect();
    ids.sort();
    ids
}

/// Forget every external registration
pub fn reset_registry() {
    REGISTRY.write().clear();
}
