// ABOUTME: Discovery Engine: fans out across configured upstreams, isolating per-upstream failure

use std::collections::HashMap;
use std::sync::Arc;

use rmcp::model::Tool;
use tracing::{info, warn};

use crate::config::model::{Authorization, UpstreamServerConfig};
use crate::errors::AppResult;
use crate::oauth::TokenStore;
use crate::transport::TransportClient;

/// Which step of one upstream's discovery is in progress; reported through
/// `progress` so a CLI can render a per-server status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    /// Opening the transport connection.
    Connecting,
    /// Resolving credentials for an oauth2-protected upstream.
    Authenticating,
    /// `list_tools` is in flight.
    Fetching,
    /// This upstream's tools are in hand.
    Done,
    /// This upstream failed; the overall discovery continues.
    Error,
}

/// Tools discovered from one upstream, or the error that stopped it — errors
/// never abort discovery of the other upstreams.
#[derive(Debug, Clone)]
pub struct UpstreamDiscoveryResult {
    /// The configured server name.
    pub server_name: String,
    /// Raw tools returned by the upstream, empty on failure.
    pub tools: Vec<Tool>,
    /// The failure, if this upstream could not be reached or authenticated.
    pub error: Option<String>,
}

/// A callback invoked as each upstream moves through its discovery phases.
pub type ProgressCallback = Arc<dyn Fn(&str, DiscoveryPhase) + Send + Sync>;

/// Discovers tools across all configured upstreams, excluding named servers
/// and isolating failures so one broken upstream never blocks the rest.
pub struct DiscoveryEngine {
    transport: TransportClient,
    token_store: TokenStore,
}

impl DiscoveryEngine {
    /// Build a discovery engine with the default transport timeout and token store.
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

    /// Discover tools from every server in `servers` except those named in `exclude`.
    pub async fn discover_all(
        &self,
        servers: &HashMap<String, UpstreamServerConfig>,
        exclude: &[String],
        progress: Option<ProgressCallback>,
    ) -> Vec<UpstreamDiscoveryResult> {
        let mut results = Vec::with_capacity(servers.len());
        for (server_name, config) in servers {
            if exclude.iter().any(|excluded| excluded == server_name) {
                continue;
            }
            results.push(self.discover_one(server_name, config, progress.clone()).await);
        }
        results
    }

    async fn discover_one(
        &self,
        server_name: &str,
        config: &UpstreamServerConfig,
        progress: Option<ProgressCallback>,
    ) -> UpstreamDiscoveryResult {
        let report = |phase: DiscoveryPhase| {
            if let Some(cb) = &progress {
                cb(server_name, phase);
            }
        };

        report(DiscoveryPhase::Connecting);

        let bearer_token = match self.resolve_bearer_token(server_name, config) {
            Ok(token) => token,
            Err(e) => {
                report(DiscoveryPhase::Error);
                warn!(server_name, error = %e, "credential resolution failed");
                return UpstreamDiscoveryResult {
                    server_name: server_name.to_owned(),
                    tools: Vec::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        if matches!(config.authorization, Authorization::Oauth2 { .. }) {
            report(DiscoveryPhase::Authenticating);
        }

        let connected = match self.transport.connect(server_name, config, bearer_token.as_deref()).await {
            Ok(c) => c,
            Err(e) => {
                report(DiscoveryPhase::Error);
                warn!(server_name, error = %e, "connect failed");
                return UpstreamDiscoveryResult {
                    server_name: server_name.to_owned(),
                    tools: Vec::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        report(DiscoveryPhase::Fetching);
        let tools = match connected.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                report(DiscoveryPhase::Error);
                let _ = connected.close().await;
                warn!(server_name, error = %e, "list_tools failed");
                return UpstreamDiscoveryResult {
                    server_name: server_name.to_owned(),
                    tools: Vec::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        if let Err(e) = connected.close().await {
            warn!(server_name, error = %e, "close failed after successful discovery");
        }

        report(DiscoveryPhase::Done);
        info!(server_name, tool_count = tools.len(), "discovered tools");
        UpstreamDiscoveryResult {
            server_name: server_name.to_owned(),
            tools,
            error: None,
        }
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
                    Some(_) => Err(crate::errors::AppError::auth_required(server_name)
                        .with_hint(format!("run `mcp auth {server_name}` to refresh"))),
                    None => Err(crate::errors::AppError::auth_required(server_name)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_list_is_respected() {
        let mut servers = HashMap::new();
        servers.insert(
            "skip-me".to_owned(),
            UpstreamServerConfig {
                command: Some("echo".into()),
                args: None,
                env: None,
                url: None,
                transport: None,
                authorization: Authorization::None,
            },
        );
        let exclude = vec!["skip-me".to_owned()];
        assert!(exclude.iter().any(|e| e == "skip-me"));
        assert_eq!(servers.len(), 1);
    }
}
