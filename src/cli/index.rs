// ABOUTME: `please index` — discover upstream tools, build the searchable index, and persist it

use chrono::Utc;
use clap::Args;
use tracing::info;

use crate::config::environment::GatewayEnvironment;
use crate::config::model::IndexScope;
use crate::config::resolver::{ConfigFingerprints, ConfigResolver};
use crate::discovery::DiscoveryEngine;
use crate::embeddings::EmbeddingProviderRegistry;
use crate::errors::AppResult;
use crate::index::builder::{compute_bm25_stats, embed_tools, index_tools_from_upstream};
use crate::index::model::{BuildMetadata, EmbeddingProviderTag, IndexedTool, PersistedIndex};
use crate::index::regen::{self, DesiredBuildFlags};
use crate::index::IndexStore;

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Which scope to build: `user`, `project`, or `all`.
    #[arg(long, default_value = "project")]
    pub scope: String,
    /// Embedding provider tag, e.g. `local:general-purpose`. Omit for a
    /// lexical-only index, unless `PLEASE_DEFAULT_EMBEDDING_PROVIDER` is set.
    #[arg(long)]
    pub provider: Option<String>,
    /// Quantization for local providers: `fp32`, `fp16`, `q8`, `q4f16`.
    #[arg(long)]
    pub dtype: Option<String>,
    /// Server names to exclude from this build.
    #[arg(long = "exclude")]
    pub excluded_servers: Vec<String>,
    /// Rebuild even if the Regeneration Detector finds nothing stale.
    #[arg(long)]
    pub force: bool,
}

/// Run `please index`.
///
/// # Errors
///
/// Returns a configuration error for an unknown scope or provider, or
/// whatever error discovery/embedding/persistence encounters.
pub async fn run(args: IndexArgs) -> AppResult<()> {
    let scope = super::index_scope(&args.scope)?;
    let cwd = std::env::current_dir()?;
    let resolver = ConfigResolver::new(cwd.clone())?;
    let store = IndexStore::new(cwd)?;

    let provider_arg = args
        .provider
        .clone()
        .or_else(|| GatewayEnvironment::from_env().default_embedding_provider);

    let embedding_provider_tag = provider_arg
        .as_ref()
        .map(|tag| {
            let (location, model) = tag
                .split_once(':')
                .ok_or_else(|| crate::errors::AppError::config(format!("provider tag '{tag}' must be 'location:model'")))?;
            Ok::<_, crate::errors::AppError>(EmbeddingProviderTag {
                location: location.to_owned(),
                model: model.to_owned(),
                dtype: args.dtype.clone(),
            })
        })
        .transpose()?;

    let fingerprints = resolver.fingerprints();
    let desired = DesiredBuildFlags {
        gateway_version: crate::constants::CLI_VERSION.to_owned(),
        embedding_provider: embedding_provider_tag.clone(),
        excluded_servers: args.excluded_servers.clone(),
    };

    if !args.force {
        let decision = regen::check(&store.path_for(scope), &desired, &fingerprints);
        if !decision.should_regenerate {
            info!(reasons = ?decision.reasons, "index is up to date, skipping rebuild");
            println!("Index is up to date.");
            return Ok(());
        }
        info!(reasons = ?decision.reasons, "rebuilding index");
    }

    let server_count = resolver.merged_for_index_scope(scope).len();
    let index = build_and_persist(scope, &desired, fingerprints, &resolver, &store).await?;

    println!("Indexed {} tools across {} servers.", index.tools.len(), server_count);
    Ok(())
}

/// Discover upstream tools, embed them if requested, and persist the result —
/// the part of `please index` shared with the auto-rebuild path `please serve`
/// takes before it starts handling requests. Prints nothing; callers that run
/// this over stdio depend on stdout staying clear for the MCP transport.
///
/// # Errors
///
/// Returns whatever error discovery, embedding, or persistence encounters.
pub(crate) async fn build_and_persist(
    scope: IndexScope,
    desired: &DesiredBuildFlags,
    fingerprints: ConfigFingerprints,
    resolver: &ConfigResolver,
    store: &IndexStore,
) -> AppResult<PersistedIndex> {
    let servers = resolver.merged_for_index_scope(scope);
    let engine = DiscoveryEngine::new()?;
    let discovered = engine
        .discover_all(&servers, &desired.excluded_servers, None)
        .await;

    let mut tools: Vec<IndexedTool> = Vec::new();
    for result in &discovered {
        if let Some(error) = &result.error {
            eprintln!("warning: '{}' failed to discover: {error}", result.server_name);
            continue;
        }
        tools.extend(index_tools_from_upstream(
            &result.server_name,
            result.tools.clone(),
        ));
    }

    if let Some(tag) = &desired.embedding_provider {
        let registry = EmbeddingProviderRegistry::default();
        let full_tag = format!("{}:{}", tag.location, tag.model);
        let provider = registry.resolve(&full_tag, tag.dtype.as_deref())?;
        provider.initialize().await?;
        embed_tools(
            &mut tools,
            provider.as_ref(),
            Some(std::sync::Arc::new(|done, total| {
                info!(done, total, "embedding progress");
            })),
        )
        .await?;
    }

    let bm25_stats = compute_bm25_stats(&tools);
    let metadata = BuildMetadata {
        format_version: crate::constants::INDEX_FORMAT_VERSION.to_owned(),
        gateway_version: desired.gateway_version.clone(),
        scope,
        embedding_provider: desired.embedding_provider.clone(),
        excluded_servers: desired.excluded_servers.clone(),
        config_fingerprints: fingerprints,
        built_at: Utc::now().to_rfc3339(),
    };

    let index = PersistedIndex {
        tools,
        bm25_stats,
        metadata,
    };
    store.save(scope, &index)?;
    Ok(index)
}
