// ABOUTME: Data model for upstream server configuration
// ABOUTME: One schema shared by the user/project/local config scopes

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One of the three configuration scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// `$HOME/.please/mcp.json` — cross-project.
    User,
    /// `<cwd>/.please/mcp.json` — committed to version control.
    Project,
    /// `<cwd>/.please/mcp.local.json` — gitignored, per checkout.
    Local,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::User => "user",
            Self::Project => "project",
            Self::Local => "local",
        };
        write!(f, "{s}")
    }
}

/// Which index a caller wants: a single scope, or `all` (merged user+project).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexScope {
    /// Only the user-scoped index.
    User,
    /// Only the project-scoped index (sees user+project+local configs).
    Project,
    /// Both, merged (project overrides user on name collision).
    All,
}

/// The transport an upstream server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Spawn a child process, speak MCP over its stdio.
    Stdio,
    /// Streamable HTTP (a long-lived POST endpoint).
    Http,
    /// Server-sent events.
    Sse,
}

/// Authorization mode for an upstream server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Authorization {
    /// No credentials sent.
    None,
    /// A static bearer token.
    Bearer {
        /// The token value.
        token: String,
    },
    /// Full OAuth 2.1 authorization-code + PKCE flow.
    Oauth2 {
        /// Requested scopes, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scopes: Option<Vec<String>>,
        /// RFC 8707 resource indicator, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resource: Option<String>,
        /// Explicit authorization server origin, if discovery should be skipped.
        #[serde(
            default,
            rename = "authorizationServer",
            skip_serializing_if = "Option::is_none"
        )]
        authorization_server: Option<String>,
    },
}

impl Default for Authorization {
    fn default() -> Self {
        Self::None
    }
}

/// One upstream server's configuration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamServerConfig {
    /// Child process command, for stdio transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Arguments to the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Environment overlay for the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    /// Upstream URL, for http/sse transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Explicit transport override; inferred from `url`/`command` if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportKind>,
    /// Authorization mode.
    #[serde(default)]
    pub authorization: Authorization,
}

impl UpstreamServerConfig {
    /// Resolve the effective transport: an explicit override wins;
    /// otherwise `url` implies HTTP, else stdio.
    #[must_use]
    pub fn effective_transport(&self) -> TransportKind {
        if let Some(t) = self.transport {
            return t;
        }
        if self.url.is_some() {
            TransportKind::Http
        } else {
            TransportKind::Stdio
        }
    }

    /// Validate that the config has enough fields for its effective transport.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a stdio server has no `command`, or an
    /// http/sse server has no `url`.
    pub fn validate(&self, name: &str) -> crate::errors::AppResult<()> {
        use crate::errors::AppError;
        match self.effective_transport() {
            TransportKind::Stdio if self.command.is_none() => Err(AppError::config(format!(
                "server '{name}' uses stdio transport but has no `command`"
            ))),
            TransportKind::Http | TransportKind::Sse if self.url.is_none() => {
                Err(AppError::config(format!(
                    "server '{name}' uses {:?} transport but has no `url`",
                    self.effective_transport()
                )))
            }
            _ => Ok(()),
        }
    }
}

/// The top-level shape of a `mcp.json` / `mcp.local.json` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpServersFile {
    /// Map of server name to its configuration.
    #[serde(default, rename = "mcpServers")]
    pub mcp_servers: HashMap<String, UpstreamServerConfig>,
}
