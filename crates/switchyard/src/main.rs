//! Switchyard - talk to OpenAI-compatible, local and Anthropic backends
//! through one normalized content interface.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use switchyard_core::ai::models::{self, CatalogModel, ModelCategory};
use switchyard_core::ai::types::{
    approximate_token_count, GenerationConfig, UsageMetadata,
};
use switchyard_core::{
    create_content_generator, Content, ContentGenerator, GenerateContentRequest,
    GenerateContentResponse, GeneratorConfig, ProviderId, ToolCatalog,
};

/// Switchyard - multi-backend content generation
#[derive(Parser)]
#[command(name = "switchyard", version)]
#[command(about = "Send prompts to OpenAI-compatible, local and Anthropic backends", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a response for a prompt
    Generate {
        /// Provider id (openai-compatible, local-llm, lm-studio, anthropic, azure)
        #[arg(short, long, env = "SWITCHYARD_PROVIDER", default_value = "openai-compatible")]
        provider: String,

        /// Model (or Azure deployment)
        #[arg(short, long)]
        model: Option<String>,

        /// Print text as it streams in
        #[arg(long)]
        stream: bool,

        /// JSON schema file; the response is requested as JSON matching it
        #[arg(long)]
        json_schema: Option<PathBuf>,

        /// Command whose stdout lists tool declarations to offer the model
        #[arg(long)]
        tools_command: Option<String>,

        /// Overrides the provider's base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Request deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        prompt: String,
    },

    /// Estimate the token count of some text
    CountTokens { text: String },

    /// List models for a provider
    Models {
        #[arg(short, long, default_value = "anthropic")]
        provider: String,

        /// Query the backend instead of the static catalog
        #[arg(long)]
        live: bool,

        /// Restrict the LM Studio catalog to one category
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
    },

    /// Run a tool discovery command and print its declarations
    DiscoverTools { command: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoryArg {
    Coding,
    General,
    Embedding,
}

impl From<CategoryArg> for ModelCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Coding => ModelCategory::Coding,
            CategoryArg::General => ModelCategory::General,
            CategoryArg::Embedding => ModelCategory::Embedding,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only results
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            provider,
            model,
            stream,
            json_schema,
            tools_command,
            base_url,
            timeout_ms,
            prompt,
        } => {
            let provider: ProviderId = provider.parse()?;
            let mut config = GeneratorConfig::from_env(provider, model.as_deref())?;
            if let Some(url) = base_url {
                config.base_url = Some(url);
            }
            if let Some(ms) = timeout_ms {
                config.timeout = Some(Duration::from_millis(ms));
            }
            let generator = create_content_generator(provider.key(), config)?;

            let mut request = GenerateContentRequest::new(vec![Content::user(prompt)]);
            if let Some(path) = json_schema {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read schema {}", path.display()))?;
                let schema: Value = serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid JSON in {}", path.display()))?;
                request.generation_config = GenerationConfig {
                    response_mime_type: Some("application/json".to_string()),
                    response_schema: Some(schema),
                    ..Default::default()
                };
            }
            if let Some(command) = tools_command {
                let catalog = ToolCatalog::new();
                catalog.refresh_discovered(&command).await?;
                request.tools = catalog.function_declarations().await;
            }

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling request");
                    on_interrupt.cancel();
                }
            });

            if stream {
                run_stream(generator.as_ref(), &request, cancel).await?;
            } else {
                let response = generator.generate_content(&request, &cancel).await?;
                println!("{}", response.text());
                print_function_calls(&response);
                print_usage(&response.usage_metadata, response.finish_reason());
            }
        }
        Commands::CountTokens { text } => {
            let count = approximate_token_count(&[Content::user(text)]);
            println!("{} (approximate)", count);
        }
        Commands::Models {
            provider,
            live,
            category,
        } => {
            let provider: ProviderId = provider.parse()?;
            if live {
                let config = GeneratorConfig::from_env(provider, None)?;
                let generator = create_content_generator(provider.key(), config)?;
                for model in generator.list_models().await? {
                    println!("{}  ({})", model.id, model.owned_by);
                }
            } else {
                match provider {
                    ProviderId::Anthropic => print_catalog(models::anthropic_models().iter()),
                    ProviderId::LmStudio => match category {
                        Some(category) => print_catalog(
                            models::lm_studio_models_by_category(category.into()).into_iter(),
                        ),
                        None => print_catalog(models::lm_studio_models().iter()),
                    },
                    other => println!("No static catalog for {}; use --live", other),
                }
            }
        }
        Commands::DiscoverTools { command } => {
            let declarations = switchyard_core::tools::discover_tools(&command).await?;
            println!("{}", serde_json::to_string_pretty(&declarations)?);
        }
    }

    Ok(())
}

async fn run_stream(
    generator: &dyn ContentGenerator,
    request: &GenerateContentRequest,
    cancel: CancellationToken,
) -> Result<()> {
    let mut stream = generator
        .generate_content_stream(request, cancel.clone())
        .await?;
    let mut usage = UsageMetadata::default();
    let mut finish_reason = None;
    let mut stdout = std::io::stdout();

    while let Some(frame) = stream.next().await {
        let frame = frame?;
        merge_usage(&mut usage, &frame.usage_metadata);
        if frame.is_usage_only() {
            continue;
        }
        let text = frame.text();
        if !text.is_empty() {
            write!(stdout, "{}", text)?;
            stdout.flush()?;
        }
        print_function_calls(&frame);
        if let Some(reason) = frame.finish_reason() {
            finish_reason = Some(reason.to_string());
        }
    }
    println!();

    if cancel.is_cancelled() {
        eprintln!("[cancelled]");
    } else {
        print_usage(&usage, finish_reason.as_deref());
    }
    Ok(())
}

/// Streams report usage in pieces; keep the largest value seen per field
fn merge_usage(total: &mut UsageMetadata, frame: &UsageMetadata) {
    total.prompt_tokens = total.prompt_tokens.max(frame.prompt_tokens);
    total.completion_tokens = total.completion_tokens.max(frame.completion_tokens);
    total.total_tokens = total
        .total_tokens
        .max(frame.total_tokens)
        .max(total.prompt_tokens + total.completion_tokens);
}

fn print_function_calls(response: &GenerateContentResponse) {
    for call in response.function_calls() {
        println!(
            "[function call] {}({}){}",
            call.name,
            Value::Object(call.args),
            call.id.map(|id| format!(" id={}", id)).unwrap_or_default()
        );
    }
}

fn print_usage(usage: &UsageMetadata, finish_reason: Option<&str>) {
    eprintln!(
        "[usage] prompt={} completion={} total={} finish={}",
        usage.prompt_tokens,
        usage.completion_tokens,
        usage.total_tokens,
        finish_reason.unwrap_or("-")
    );
}

fn print_catalog<'a>(models: impl Iterator<Item = &'a CatalogModel>) {
    for model in models {
        let marker = if model.is_default { "*" } else { " " };
        println!("{} {:<50} {}", marker, model.id, model.display_name);
    }
}
