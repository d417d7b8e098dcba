// ABOUTME: Single-shot MCP transport client over stdio, streamable HTTP, or SSE
// ABOUTME: Grounded on rmcp's client service pattern; adorns tool names with their upstream's provenance

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use rmcp::model::{CallToolRequestParam, CallToolResult, ClientInfo, Implementation, Tool};
use rmcp::service::RunningService;
use rmcp::transport::sse_client::SseClientTransport;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransport;
use rmcp::transport::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt};
use tokio::process::Command;

use crate::config::model::{TransportKind, UpstreamServerConfig};
use crate::constants::DEFAULT_MCP_TIMEOUT_SECS;
use crate::errors::{AppError, AppResult};

/// Coarse lifecycle state of one transport connection, mirrored in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Not yet connected.
    Idle,
    /// Spawning the child process or opening the HTTP/SSE session.
    Connecting,
    /// Initialize handshake complete; `list_tools`/`call_tool` are usable.
    Ready,
    /// Shutting the session down.
    Closing,
    /// Fully torn down.
    Closed,
}

enum Session {
    Stdio(RunningService<RoleClient, ()>),
    Http(RunningService<RoleClient, ClientInfo>),
    Sse(RunningService<RoleClient, ClientInfo>),
}

impl Session {
    async fn list_tools(&self) -> Result<Vec<Tool>, rmcp::ServiceError> {
        let result = match self {
            Self::Stdio(s) => s.list_tools(None).await?,
            Self::Http(s) => s.list_tools(None).await?,
            Self::Sse(s) => s.list_tools(None).await?,
        };
        Ok(result.tools)
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParam,
    ) -> Result<CallToolResult, rmcp::ServiceError> {
        match self {
            Self::Stdio(s) => s.call_tool(params).await,
            Self::Http(s) => s.call_tool(params).await,
            Self::Sse(s) => s.call_tool(params).await,
        }
    }

    async fn cancel(self) -> AppResult<()> {
        let result = match self {
            Self::Stdio(s) => s.cancel().await,
            Self::Http(s) => s.cancel().await,
            Self::Sse(s) => s.cancel().await,
        };
        result.map(|_| ()).map_err(|e| AppError::transport(e.to_string()))
    }
}

/// A live connection to one upstream MCP server, scoped to a single discovery
/// or execution round trip.
pub struct ConnectedUpstream {
    server_name: String,
    session: Session,
    timeout: Duration,
}

impl ConnectedUpstream {
    /// List the upstream's raw tools, each adorned below with provenance when
    /// folded into the index (see `index::builder`).
    ///
    /// # Errors
    ///
    /// Returns a transport error if the request times out or the upstream
    /// returns a protocol-level failure.
    pub async fn list_tools(&self) -> AppResult<Vec<Tool>> {
        tokio::time::timeout(self.timeout, self.session.list_tools())
            .await
            .map_err(|_| AppError::transport(format!("'{}' timed out listing tools", self.server_name)))?
            .map_err(|e| AppError::transport(format!("'{}' list_tools failed: {e}", self.server_name)))
    }

    /// Invoke `original_name` (the upstream's own tool name, with any
    /// provenance prefix already stripped by the caller) with `arguments`.
    ///
    /// # Errors
    ///
    /// Returns a transport error on timeout or protocol failure. A
    /// tool-level failure (`isError: true`) is returned as `Ok` with that
    /// flag set — the caller decides how to surface it.
    pub async fn call_tool(
        &self,
        original_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> AppResult<CallToolResult> {
        let params = CallToolRequestParam {
            name: original_name.to_owned().into(),
            arguments,
        };
        tokio::time::timeout(self.timeout, self.session.call_tool(params))
            .await
            .map_err(|_| AppError::transport(format!("'{}' timed out calling tool", self.server_name)))?
            .map_err(|e| AppError::transport(format!("'{}' call_tool failed: {e}", self.server_name)))
    }

    /// Close the underlying session.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the shutdown handshake fails.
    pub async fn close(self) -> AppResult<()> {
        self.session.cancel().await
    }
}

/// Opens single-shot connections to upstream MCP servers, dispatching on
/// their configured transport.
pub struct TransportClient {
    timeout: Duration,
}

impl Default for TransportClient {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_MCP_TIMEOUT_SECS),
        }
    }
}

impl TransportClient {
    /// Build a client with a non-default timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Connect to `server_name` per `config`, completing the MCP initialize
    /// handshake before returning.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config is invalid for its
    /// transport, or a transport error if the process fails to spawn or the
    /// handshake fails.
    pub async fn connect(
        &self,
        server_name: &str,
        config: &UpstreamServerConfig,
        bearer_token: Option<&str>,
    ) -> AppResult<ConnectedUpstream> {
        config.validate(server_name)?;
        let connect = async {
            match config.effective_transport() {
                TransportKind::Stdio => self.connect_stdio(config).await,
                TransportKind::Http => self.connect_http(config, bearer_token).await,
                TransportKind::Sse => self.connect_sse(config, bearer_token).await,
            }
        };
        let session = tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| AppError::transport(format!("'{server_name}' timed out connecting")))??;
        Ok(ConnectedUpstream {
            server_name: server_name.to_owned(),
            session,
            timeout: self.timeout,
        })
    }

    async fn connect_stdio(&self, config: &UpstreamServerConfig) -> AppResult<Session> {
        let command_name = config
            .command
            .as_ref()
            .ok_or_else(|| AppError::config("stdio server missing `command`"))?;
        let mut command = Command::new(command_name);
        if let Some(args) = &config.args {
            command.args(args);
        }
        if let Some(env) = &config.env {
            for (key, value) in env {
                command.env(key, value);
            }
        }

        let transport = TokioChildProcess::new(command)
            .map_err(|e| AppError::transport(format!("failed to spawn '{command_name}': {e}")))?;
        let client = ()
            .serve(transport)
            .await
            .map_err(|e| AppError::transport(format!("stdio handshake failed: {e}")))?;
        Ok(Session::Stdio(client))
    }

    async fn connect_http(
        &self,
        config: &UpstreamServerConfig,
        bearer_token: Option<&str>,
    ) -> AppResult<Session> {
        let url = config
            .url
            .as_ref()
            .ok_or_else(|| AppError::config("http server missing `url`"))?;
        let http_client = authorized_http_client(bearer_token)?;
        let transport = StreamableHttpClientTransport::with_client(http_client, url.clone());
        let client = client_info()
            .serve(transport)
            .await
            .map_err(|e| AppError::transport(format!("http handshake failed: {e}")))?;
        Ok(Session::Http(client))
    }

    async fn connect_sse(
        &self,
        config: &UpstreamServerConfig,
        bearer_token: Option<&str>,
    ) -> AppResult<Session> {
        let url = config
            .url
            .as_ref()
            .ok_or_else(|| AppError::config("sse server missing `url`"))?;
        let http_client = authorized_http_client(bearer_token)?;
        let transport = SseClientTransport::start_with_client(http_client, url.clone())
            .await
            .map_err(|e| AppError::transport(format!("sse connect failed: {e}")))?;
        let client = client_info()
            .serve(transport)
            .await
            .map_err(|e| AppError::transport(format!("sse handshake failed: {e}")))?;
        Ok(Session::Sse(client))
    }
}

fn client_info() -> ClientInfo {
    ClientInfo {
        protocol_version: Default::default(),
        capabilities: Default::default(),
        client_info: Implementation {
            name: crate::constants::CLI_PACKAGE_NAME.to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        },
    }
}

fn authorized_http_client(bearer_token: Option<&str>) -> AppResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(token) = bearer_token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| AppError::config(format!("invalid bearer token: {e}")))?;
        headers.insert(AUTHORIZATION, value);
    }
    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|e| AppError::internal(format!("failed to build http client: {e}")))
}

/// Prefix a raw tool name with its upstream's provenance, e.g. `github__search_issues`.
#[must_use]
pub fn adorn_with_provenance(server_name: &str, tool_name: &str) -> String {
    format!("{server_name}__{tool_name}")
}

/// Split a provenance-adorned tool name back into `(server_name, original_name)`.
#[must_use]
pub fn split_provenance(adorned_name: &str) -> Option<(&str, &str)> {
    adorned_name.split_once("__")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adorns_and_splits_round_trip() {
        let adorned = adorn_with_provenance("github", "search_issues");
        assert_eq!(adorned, "github__search_issues");
        assert_eq!(split_provenance(&adorned), Some(("github", "search_issues")));
    }

    #[test]
    fn split_returns_none_without_separator() {
        assert_eq!(split_provenance("bare_name"), None);
    }

    #[test]
    fn split_uses_first_separator_only() {
        assert_eq!(
            split_provenance("server__tool__with__underscores"),
            Some(("server", "tool__with__underscores"))
        );
    }
}
