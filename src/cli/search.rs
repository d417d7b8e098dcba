// ABOUTME: `please search` — run one query against a persisted index and print ranked results

use clap::Args;

use crate::cli::OutputFormat;
use crate::config::model::IndexScope;
use crate::embeddings::EmbeddingProviderRegistry;
use crate::errors::AppResult;
use crate::index::IndexStore;
use crate::search::orchestrator::{SearchMode, SearchOrchestrator};

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// The query text.
    pub query: String,
    /// `regex`, `bm25`, `embedding`, or `hybrid`.
    #[arg(long, default_value = "hybrid")]
    pub mode: String,
    /// Maximum number of results.
    #[arg(long, default_value_t = 10)]
    pub top_k: usize,
    /// Minimum score to include a result.
    #[arg(long, default_value_t = 0.0)]
    pub threshold: f64,
    /// Which index to search.
    #[arg(long, default_value = "project")]
    pub scope: String,
    /// Output rendering.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

/// Run `please search`.
///
/// # Errors
///
/// Returns a configuration error for an unknown mode/scope, a corpus error
/// if the index has no tools with embeddings for `embedding`/`hybrid` mode,
/// or an index-integrity error if no index has been built yet.
pub async fn run(args: SearchArgs) -> AppResult<()> {
    let scope = super::index_scope(&args.scope)?;
    let mode = SearchMode::parse(&args.mode)?;
    let cwd = std::env::current_dir()?;
    let store = IndexStore::new(cwd)?;

    let index = store.load(scope)?.ok_or_else(|| {
        crate::errors::AppError::index_integrity("no index found")
            .with_hint("run `please index` first")
    })?;

    let provider = match &index.metadata.embedding_provider {
        Some(tag) => {
            let registry = EmbeddingProviderRegistry::default();
            let full_tag = format!("{}:{}", tag.location, tag.model);
            Some(registry.resolve(&full_tag, tag.dtype.as_deref())?)
        }
        None => None,
    };

    let orchestrator = SearchOrchestrator::new(provider);
    let response = orchestrator
        .search(mode, &index.tools, &args.query, Some(args.top_k), args.threshold)
        .await?;

    render(&response.results, args.format);
    eprintln!("({} results in {}ms)", response.results.len(), response.latency_ms);
    Ok(())
}

fn render(results: &[crate::search::SearchResult], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results).unwrap_or_default());
        }
        OutputFormat::Minimal => {
            for result in results {
                println!("{}", result.name);
            }
        }
        OutputFormat::Table => {
            for result in results {
                println!("{:<40} {:>8.4}  {}", result.name, result.score, result.description);
            }
        }
    }
}
