// ABOUTME: The MCP-facing gateway server: search_tools, list_tools, get_tool, tool_search_info
// ABOUTME: Serves a cached merged index through rmcp's tool_router instead of proxying live upstream tools

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::embeddings::EmbeddingProvider;
use crate::index::merge::merge_indexed_tools;
use crate::index::model::IndexedTool;
use crate::search::orchestrator::{SearchMode, SearchOrchestrator};

/// The merged corpus served to the host, rebuilt whenever either source index changes.
#[derive(Default)]
struct Corpus {
    tools: Vec<IndexedTool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchToolsArgs {
    /// The natural-language or pattern query to search for.
    pub query: String,
    /// `regex`, `bm25`, `embedding`, or `hybrid`. Defaults to `hybrid`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Maximum number of results to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    /// Minimum score a result must reach to be included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListToolsArgs {
    /// Only list tools whose provenance-adorned name starts with this server name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetToolArgs {
    /// The tool's provenance-adorned name, e.g. `github__search_issues`.
    pub name: String,
}

/// The rmcp server handler the host connects to: three meta-tools instead of
/// exposing every upstream tool directly, so the host's own context budget
/// stays flat no matter how many upstreams are configured.
#[derive(Clone)]
pub struct GatewayServer {
    corpus: Arc<RwLock<Corpus>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    default_mode: SearchMode,
    tool_router: ToolRouter<Self>,
}

impl GatewayServer {
    /// Build a server over an already-merged set of indexed tools. `default_mode`
    /// is used for `search_tools` calls that omit `mode`, e.g. set from `please
    /// serve --mode`.
    #[must_use]
    pub fn new(
        tools: Vec<IndexedTool>,
        embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
        default_mode: SearchMode,
    ) -> Self {
        Self {
            corpus: Arc::new(RwLock::new(Corpus { tools })),
            embedding_provider,
            default_mode,
            tool_router: Self::tool_router(),
        }
    }

    /// Replace the served corpus, e.g. after `please index` regenerates either
    /// the user- or project-scope index underneath a running server.
    pub async fn replace_corpus(&self, user_tools: &[IndexedTool], project_tools: &[IndexedTool]) {
        let merged = merge_indexed_tools(user_tools, project_tools);
        info!(tool_count = merged.len(), "gateway corpus refreshed");
        self.corpus.write().await.tools = merged;
    }
}

#[tool_router]
impl GatewayServer {
    #[tool(description = "Search the indexed tool corpus by relevance, returning a ranked list of matches.")]
    pub async fn search_tools(
        &self,
        Parameters(args): Parameters<SearchToolsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let mode = match args.mode.as_deref() {
            Some(name) => match SearchMode::parse(name) {
                Ok(mode) => mode,
                Err(e) => return Ok(error_result(&e.to_string())),
            },
            None => self.default_mode,
        };

        let corpus = self.corpus.read().await;
        let orchestrator = SearchOrchestrator::new(self.embedding_provider.clone());
        match orchestrator
            .search(mode, &corpus.tools, &args.query, args.top_k, args.threshold.unwrap_or(0.0))
            .await
        {
            Ok(response) => {
                let body = serde_json::to_string_pretty(&response.results)
                    .unwrap_or_else(|_| "[]".to_owned());
                Ok(CallToolResult::success(vec![Content::text(body)]))
            }
            Err(e) => Ok(error_result(&e.to_string())),
        }
    }

    #[tool(description = "List every indexed tool, optionally filtered to one upstream server.")]
    pub async fn list_tools(
        &self,
        Parameters(args): Parameters<ListToolsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let corpus = self.corpus.read().await;
        let names: Vec<&str> = corpus
            .tools
            .iter()
            .filter(|t| {
                args.server_name
                    .as_ref()
                    .is_none_or(|server_name| &t.server_name == server_name)
            })
            .map(|t| t.name.as_str())
            .collect();
        let body = serde_json::to_string_pretty(&names).unwrap_or_else(|_| "[]".to_owned());
        Ok(CallToolResult::success(vec![Content::text(body)]))
    }

    #[tool(description = "Get a tool's full definition plus a ready-to-run CLI usage example.")]
    pub async fn get_tool(
        &self,
        Parameters(args): Parameters<GetToolArgs>,
    ) -> Result<CallToolResult, McpError> {
        let corpus = self.corpus.read().await;
        let Some(tool) = corpus.tools.iter().find(|t| t.name == args.name) else {
            return Ok(error_result(&format!("tool '{}' not found", args.name)));
        };

        let usage = build_cli_usage_template(&tool.name, &tool.definition.input_schema);
        let body = serde_json::json!({
            "name": tool.name,
            "server_name": tool.server_name,
            "definition": tool.definition,
            "cli_usage": usage,
        });
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&body).unwrap_or_default(),
        )]))
    }

    #[tool(description = "Describe which search modes are available and whether embeddings are configured.")]
    pub async fn tool_search_info(&self) -> Result<CallToolResult, McpError> {
        let corpus = self.corpus.read().await;
        let body = serde_json::json!({
            "tool_count": corpus.tools.len(),
            "has_embeddings": corpus.tools.iter().any(|t| t.embedding.is_some()),
            "modes": ["regex", "bm25", "embedding", "hybrid"],
        });
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&body).unwrap_or_default(),
        )]))
    }
}

#[tool_handler]
impl ServerHandler for GatewayServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: crate::constants::CLI_PACKAGE_NAME.to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
            },
            instructions: Some(
                "This server indexes many upstream MCP servers offline. Use search_tools to \
                 find a tool by intent, get_tool for its full schema and a CLI usage example, \
                 then run it with `please call <name>`."
                    .to_owned(),
            ),
        }
    }
}

fn error_result(message: &str) -> CallToolResult {
    CallToolResult::success(vec![Content::text(format!("Error: {message}"))])
}

/// Build an `npx <package> <name> --args '<json>'` example from a tool's JSON
/// Schema. The JSON blob carries only required properties, one placeholder
/// value per property derived from its schema.
fn build_cli_usage_template(name: &str, input_schema: &serde_json::Value) -> String {
    let mut args = serde_json::Map::new();

    if let serde_json::Value::Object(schema) = input_schema {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        if let Some(serde_json::Value::Object(properties)) = schema.get("properties") {
            for prop_name in &required {
                if let Some(prop_schema) = properties.get(*prop_name) {
                    args.insert(
                        (*prop_name).to_owned(),
                        serde_json::Value::String(placeholder_for(prop_schema)),
                    );
                }
            }
        }
    }

    let args_json = serde_json::to_string(&serde_json::Value::Object(args)).unwrap_or_default();
    format!(
        "npx {} {name} --args '{args_json}'",
        crate::constants::CLI_PACKAGE_NAME
    )
}

/// Derive a placeholder value for one required property's schema: an enum
/// lists up to its first three values, truncating with `|...`; otherwise the
/// placeholder names the property's JSON type.
fn placeholder_for(prop_schema: &serde_json::Value) -> String {
    if let Some(values) = prop_schema.get("enum").and_then(|v| v.as_array()) {
        let shown: Vec<String> = values
            .iter()
            .take(3)
            .map(|v| v.as_str().map(str::to_owned).unwrap_or_else(|| v.to_string()))
            .collect();
        let suffix = if values.len() > 3 { "|..." } else { "" };
        return format!("<{}{suffix}>", shown.join("|"));
    }

    match prop_schema.get("type").and_then(|t| t.as_str()) {
        Some("string") => "<string>".to_owned(),
        Some("integer" | "number") => "<number>".to_owned(),
        Some("boolean") => "<true|false>".to_owned(),
        _ => "<value>".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_template_includes_only_required_properties() {
        let schema = serde_json::json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {"type": "string"},
                "limit": {"type": "integer"},
            }
        });
        let usage = build_cli_usage_template("github__search", &schema);
        assert!(usage.starts_with("npx please-mcp-gateway github__search --args "));
        assert!(usage.contains(r#""query":"<string>""#));
        assert!(!usage.contains("limit"));
    }

    #[test]
    fn usage_template_with_no_properties_has_empty_args() {
        let usage = build_cli_usage_template("a__noop", &serde_json::Value::Null);
        assert_eq!(usage, "npx please-mcp-gateway a__noop --args '{}'");
    }

    #[test]
    fn enum_placeholder_lists_first_three_values_with_ellipsis() {
        let schema = serde_json::json!({"enum": ["a", "b", "c", "d"]});
        assert_eq!(placeholder_for(&schema), "<a|b|c|...>");
    }

    #[test]
    fn enum_placeholder_without_truncation_has_no_ellipsis() {
        let schema = serde_json::json!({"enum": ["a", "b"]});
        assert_eq!(placeholder_for(&schema), "<a|b>");
    }

    #[test]
    fn boolean_placeholder() {
        let schema = serde_json::json!({"type": "boolean"});
        assert_eq!(placeholder_for(&schema), "<true|false>");
    }
}
