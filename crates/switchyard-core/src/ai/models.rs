//! Static model catalogs
//!
//! Known model ids for providers whose model names are validated locally.
//! Servers with dynamic model sets are queried through `list_models`.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Category used to group LM Studio models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    Coding,
    General,
    Embedding,
}

/// Catalog entry
#[derive(Debug, Clone, Serialize)]
pub struct CatalogModel {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub capabilities: &'static [&'static str],
    pub is_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ModelCategory>,
}

impl CatalogModel {
    fn new(
        id: &'static str,
        display_name: &'static str,
        description: &'static str,
        capabilities: &'static [&'static str],
    ) -> Self {
        Self {
            id,
            display_name,
            description,
            capabilities,
            is_default: false,
            category: None,
        }
    }

    fn default_model(mut self) -> Self {
        self.is_default = true;
        self
    }

    fn in_category(mut self, category: ModelCategory) -> Self {
        self.category = Some(category);
        self
    }
}

static ANTHROPIC_MODELS: LazyLock<Vec<CatalogModel>> = LazyLock::new(|| {
    vec![
        CatalogModel::new(
            "claude-sonnet-4-20250514",
            "Claude Sonnet 4",
            "Latest Claude 4 Sonnet model with enhanced capabilities",
            &["Text", "Code", "Analysis", "Vision", "Advanced Reasoning"],
        )
        .default_model(),
        CatalogModel::new(
            "claude-opus-4-20250514",
            "Claude Opus 4",
            "Most capable Claude 4 model for complex tasks",
            &["Text", "Code", "Analysis", "Creative Writing", "Complex Reasoning", "Vision"],
        ),
        CatalogModel::new(
            "claude-3-7-sonnet-20250219",
            "Claude Sonnet 3.7",
            "Advanced Claude 3.7 Sonnet model",
            &["Text", "Code", "Analysis", "Vision", "Advanced Reasoning"],
        ),
        CatalogModel::new(
            "claude-3-5-sonnet-20241022",
            "Claude Sonnet 3.5",
            "Proven Claude 3.5 Sonnet model",
            &["Text", "Code", "Analysis", "Vision", "Advanced Reasoning"],
        ),
        CatalogModel::new(
            "claude-3-5-haiku-20241022",
            "Claude Haiku 3.5",
            "Fast and efficient Claude 3.5 model",
            &["Text", "Code", "Analysis"],
        ),
    ]
});

static LM_STUDIO_MODELS: LazyLock<Vec<CatalogModel>> = LazyLock::new(|| {
    use ModelCategory::*;
    vec![
        CatalogModel::new(
            "mistralai/devstral-small-2507",
            "Devstral Small (MLX)",
            "Mistral AI Devstral small model optimized for coding tasks on MLX",
            &["Code", "Programming", "Analysis", "Debugging"],
        )
        .default_model()
        .in_category(Coding),
        CatalogModel::new(
            "qwen/qwen3-coder-30b",
            "Qwen3 Coder 30B (MLX)",
            "Large Qwen3 coder model with 30B parameters for complex coding tasks",
            &["Code", "Programming", "Complex Analysis", "Architecture Design"],
        )
        .in_category(Coding),
        CatalogModel::new(
            "text-embedding-nomic-embed-text-v1.5",
            "Nomic Embed Text v1.5",
            "High-quality text embedding model for semantic search and similarity",
            &["Embeddings", "Semantic Search", "Text Analysis"],
        )
        .in_category(Embedding),
        CatalogModel::new(
            "mlx-community/Llama-3.2-3B-Instruct-4bit",
            "Llama 3.2 3B Instruct (MLX)",
            "Fast and efficient Llama 3.2 3B model optimized for MLX",
            &["Text", "Code", "Instruct", "General Purpose"],
        )
        .in_category(General),
        CatalogModel::new(
            "mlx-community/Llama-3.1-8B-Instruct-4bit",
            "Llama 3.1 8B Instruct (MLX)",
            "Balanced Llama 3.1 8B model with MLX optimization",
            &["Text", "Code", "Analysis", "Instruct"],
        )
        .in_category(General),
        CatalogModel::new(
            "mlx-community/Qwen2.5-7B-Instruct-4bit",
            "Qwen2.5 7B Instruct (MLX)",
            "High-performance Qwen2.5 7B model for Apple Silicon",
            &["Text", "Code", "Multilingual", "Instruct"],
        )
        .in_category(General),
        CatalogModel::new(
            "mlx-community/DeepSeek-Coder-V2-Lite-Instruct-4bit",
            "DeepSeek Coder V2 Lite (MLX)",
            "Specialized coding model optimized for MLX",
            &["Code", "Programming", "Analysis"],
        )
        .in_category(Coding),
    ]
});

pub fn anthropic_models() -> &'static [CatalogModel] {
    &ANTHROPIC_MODELS
}

pub fn lm_studio_models() -> &'static [CatalogModel] {
    &LM_STUDIO_MODELS
}

fn default_of(models: &[CatalogModel], fallback: &'static str) -> &'static str {
    models
        .iter()
        .find(|m| m.is_default)
        .map(|m| m.id)
        .unwrap_or(fallback)
}

pub fn default_anthropic_model() -> &'static str {
    default_of(&ANTHROPIC_MODELS, "claude-sonnet-4-20250514")
}

pub fn anthropic_model_info(id: &str) -> Option<&'static CatalogModel> {
    ANTHROPIC_MODELS.iter().find(|m| m.id == id)
}

pub fn validate_anthropic_model(id: &str) -> bool {
    anthropic_model_info(id).is_some()
}

pub fn default_lm_studio_model() -> &'static str {
    default_of(&LM_STUDIO_MODELS, "mistralai/devstral-small-2507")
}

pub fn lm_studio_model_info(id: &str) -> Option<&'static CatalogModel> {
    LM_STUDIO_MODELS.iter().find(|m| m.id == id)
}

pub fn validate_lm_studio_model(id: &str) -> bool {
    lm_studio_model_info(id).is_some()
}

pub fn lm_studio_models_by_category(category: ModelCategory) -> Vec<&'static CatalogModel> {
    LM_STUDIO_MODELS
        .iter()
        .filter(|m| m.category == Some(category))
        .collect()
}
