// ABOUTME: Tool Executor: resolves a provenance-adorned name and dispatches the call upstream

use std::collections::HashMap;

use rmcp::model::CallToolResult;

use crate::config::model::{Authorization, UpstreamServerConfig};
use crate::errors::{AppError, AppResult};
use crate::index::model::IndexedTool;
use crate::oauth::TokenStore;
use crate::transport::client::split_provenance;
use crate::transport::TransportClient;

/// Executes one call against whichever upstream owns the named tool.
pub struct ToolExecutor {
    transport: TransportClient,
    token_store: TokenStore,
}

impl ToolExecutor {
    /// Build an executor with the default transport timeout and token store.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the home directory cannot be determined.
    pub fn new() -> AppResult<Self> {
        Ok(Self {
            transport: TransportClient::default(),
            token_store: TokenStore::new()?,
        })
    }

    /// Resolve `adorned_name` against `tools`/`servers` and run it with `arguments`.
    ///
    /// # Errors
    ///
    /// Returns a typed failure: the name carries no provenance separator or
    /// matches no indexed tool (configuration), the tool's server has no
    /// config entry (configuration), the server is oauth2-protected with no
    /// usable session (authentication), or the transport call itself fails
    /// (transport).
    pub async fn execute(
        &self,
        adorned_name: &str,
        tools: &[IndexedTool],
        servers: &HashMap<String, UpstreamServerConfig>,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> AppResult<CallToolResult> {
        let indexed = tools.iter().find(|t| t.name == adorned_name).ok_or_else(|| {
            AppError::config(format!("tool '{adorned_name}' not found in the index"))
                .with_hint("run `please search` or `please list` to see available tools")
        })?;

        let (server_name, original_name) = split_provenance(adorned_name).ok_or_else(|| {
            AppError::index_integrity(format!(
                "indexed tool '{adorned_name}' is missing its server-name prefix"
            ))
        })?;
        debug_assert_eq!(server_name, indexed.server_name);

        let config = servers.get(server_name).ok_or_else(|| {
            AppError::config(format!(
                "server '{server_name}' is not configured; it may have been removed since the index was built"
            ))
            .with_hint("run `please index` to refresh the index")
        })?;

        let bearer_token = self.resolve_bearer_token(server_name, config)?;

        let connected = self
            .transport
            .connect(server_name, config, bearer_token.as_deref())
            .await?;
        let result = connected.call_tool(original_name, arguments).await;
        let _ = connected.close().await;
        result
    }

    fn resolve_bearer_token(
        &self,
        server_name: &str,
        config: &UpstreamServerConfig,
    ) -> AppResult<Option<String>> {
        match &config.authorization {
            Authorization::None => Ok(None),
            Authorization::Bearer { token } => Ok(Some(token.clone())),
            Authorization::Oauth2 { .. } => {
                let session = self.token_store.load_session(server_name)?;
                match session {
                    Some(tokens) if !tokens.needs_refresh() => Ok(Some(tokens.access_token)),
                    _ => Err(AppError::auth_required(server_name)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, server_name: &str) -> IndexedTool {
        IndexedTool {
            name: name.to_owned(),
            original_name: name.rsplit("__").next().unwrap().to_owned(),
            server_name: server_name.to_owned(),
            definition: crate::index::model::ToolDefinition {
                name: name.to_owned(),
                title: None,
                description: None,
                input_schema: serde_json::Value::Null,
            },
            searchable_text: String::new(),
            embedding: None,
        }
    }

    #[test]
    fn split_provenance_matches_indexed_server_name() {
        let indexed = tool("github__search_issues", "github");
        let (server_name, original_name) = split_provenance(&indexed.name).unwrap();
        assert_eq!(server_name, "github");
        assert_eq!(original_name, "search_issues");
    }
}
