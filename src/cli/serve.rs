// ABOUTME: `please serve` — run the gateway as an MCP server over stdio or streamable HTTP
// ABOUTME: Checks the Regeneration Detector first and rebuilds in place before accepting requests

use clap::Args;
use rmcp::transport::io::stdio;
use rmcp::ServiceExt;
use tracing::info;

use crate::config::model::IndexScope;
use crate::config::resolver::ConfigResolver;
use crate::constants::DEFAULT_HTTP_SERVE_PORT;
use crate::embeddings::EmbeddingProviderRegistry;
use crate::errors::{AppError, AppResult};
use crate::gateway::GatewayServer;
use crate::index::merge::merge_indexed_tools;
use crate::index::model::EmbeddingProviderTag;
use crate::index::regen::{self, DesiredBuildFlags};
use crate::index::IndexStore;
use crate::search::orchestrator::SearchMode;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Which persisted index(es) to serve: `user`, `project`, or `all` (both, merged).
    #[arg(long, default_value = "all")]
    pub scope: String,
    /// `stdio` (default, for a host that spawns this process) or `http`.
    #[arg(long, default_value = "stdio")]
    pub transport: String,
    /// Port to bind for `--transport http`. Ignored for stdio.
    #[arg(long, default_value_t = DEFAULT_HTTP_SERVE_PORT)]
    pub port: u16,
    /// Serve a specific index file instead of the scope-derived one, skipping
    /// the Regeneration Detector and any auto-rebuild.
    #[arg(long)]
    pub index: Option<std::path::PathBuf>,
    /// Default `search_tools` mode used when a host call omits `mode`.
    #[arg(long, default_value = "hybrid")]
    pub mode: String,
    /// Embedding provider tag, e.g. `local:general-purpose`. Only consulted
    /// when an auto-rebuild is triggered; otherwise the stored index's own
    /// provider is used.
    #[arg(long)]
    pub provider: Option<String>,
    /// Quantization for local providers: `fp32`, `fp16`, `q8`, `q4f16`.
    #[arg(long)]
    pub dtype: Option<String>,
}

/// Run `please serve`.
///
/// # Errors
///
/// Returns a configuration error for an unknown scope/transport/mode, or
/// whatever error index loading, auto-rebuilding, or the transport encounters.
pub async fn run(args: ServeArgs) -> AppResult<()> {
    let default_mode = SearchMode::parse(&args.mode)?;

    let (tools, embedding_tag) = if let Some(explicit_path) = &args.index {
        let index = IndexStore::load_explicit(explicit_path)?.ok_or_else(|| {
            AppError::index_integrity(format!("no index found at {}", explicit_path.display()))
        })?;
        (index.tools, index.metadata.embedding_provider)
    } else {
        let scope = super::index_scope(&args.scope)?;
        let cwd = std::env::current_dir()?;
        let resolver = ConfigResolver::new(cwd.clone())?;
        let store = IndexStore::new(cwd)?;
        let desired = desired_build_flags(&args)?;

        for index_scope in scopes_to_serve(scope) {
            ensure_fresh(index_scope, &desired, &resolver, &store).await?;
        }

        let user_index = store.load(IndexScope::User)?;
        let project_index = store.load(IndexScope::Project)?;

        match scope {
            IndexScope::User => (
                user_index.as_ref().map(|i| i.tools.clone()).unwrap_or_default(),
                user_index.and_then(|i| i.metadata.embedding_provider),
            ),
            IndexScope::Project => (
                project_index.as_ref().map(|i| i.tools.clone()).unwrap_or_default(),
                project_index.and_then(|i| i.metadata.embedding_provider),
            ),
            IndexScope::All => {
                let user_tools = user_index.as_ref().map(|i| i.tools.clone()).unwrap_or_default();
                let project_tools = project_index.as_ref().map(|i| i.tools.clone()).unwrap_or_default();
                let tag = project_index
                    .as_ref()
                    .and_then(|i| i.metadata.embedding_provider.clone())
                    .or_else(|| user_index.as_ref().and_then(|i| i.metadata.embedding_provider.clone()));
                (merge_indexed_tools(&user_tools, &project_tools), tag)
            }
        }
    };

    info!(tool_count = tools.len(), scope = %args.scope, transport = %args.transport, "starting gateway");

    let embedding_provider = match embedding_tag {
        Some(tag) => {
            let registry = EmbeddingProviderRegistry::default();
            let full_tag = format!("{}:{}", tag.location, tag.model);
            let provider = registry.resolve(&full_tag, tag.dtype.as_deref())?;
            provider.initialize().await?;
            Some(provider)
        }
        None => None,
    };

    let server = GatewayServer::new(tools, embedding_provider, default_mode);

    match args.transport.as_str() {
        "stdio" => serve_stdio(server).await,
        "http" => serve_http(server, args.port).await,
        other => Err(AppError::config(format!(
            "unknown transport '{other}', expected stdio/http"
        ))),
    }
}

async fn serve_stdio(server: GatewayServer) -> AppResult<()> {
    let running = server
        .serve(stdio())
        .await
        .map_err(|e| AppError::transport(format!("failed to start stdio server: {e}")))?;
    running
        .waiting()
        .await
        .map_err(|e| AppError::transport(format!("stdio server exited with error: {e}")))?;
    Ok(())
}

async fn serve_http(server: GatewayServer, port: u16) -> AppResult<()> {
    use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
    use rmcp::transport::streamable_http_server::StreamableHttpService;

    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let router = axum::Router::new().nest_service("/mcp", service);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| AppError::transport(format!("failed to bind http server to port {port}: {e}")))?;
    info!(port, "listening for streamable-http MCP connections");
    axum::serve(listener, router)
        .await
        .map_err(|e| AppError::transport(format!("http server exited with error: {e}")))?;
    Ok(())
}

fn desired_build_flags(args: &ServeArgs) -> AppResult<DesiredBuildFlags> {
    let embedding_provider_tag = args
        .provider
        .as_ref()
        .map(|tag| {
            let (location, model) = tag.split_once(':').ok_or_else(|| {
                AppError::config(format!("provider tag '{tag}' must be 'location:model'"))
            })?;
            Ok::<_, AppError>(EmbeddingProviderTag {
                location: location.to_owned(),
                model: model.to_owned(),
                dtype: args.dtype.clone(),
            })
        })
        .transpose()?;

    Ok(DesiredBuildFlags {
        gateway_version: crate::constants::CLI_VERSION.to_owned(),
        embedding_provider: embedding_provider_tag,
        excluded_servers: Vec::new(),
    })
}

fn scopes_to_serve(scope: IndexScope) -> Vec<IndexScope> {
    match scope {
        IndexScope::User => vec![IndexScope::User],
        IndexScope::Project => vec![IndexScope::Project],
        IndexScope::All => vec![IndexScope::User, IndexScope::Project],
    }
}

/// Rebuild `index_scope`'s persisted index in place if the Regeneration
/// Detector finds it stale, before the server starts accepting requests.
async fn ensure_fresh(
    index_scope: IndexScope,
    desired: &DesiredBuildFlags,
    resolver: &ConfigResolver,
    store: &IndexStore,
) -> AppResult<()> {
    let fingerprints = resolver.fingerprints();
    let decision = regen::check(&store.path_for(index_scope), desired, &fingerprints);
    if decision.should_regenerate {
        info!(scope = ?index_scope, reasons = ?decision.reasons, "auto-rebuilding stale index before serving");
        crate::cli::index::build_and_persist(index_scope, desired, fingerprints, resolver, store).await?;
    }
    Ok(())
}
