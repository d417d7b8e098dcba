// ABOUTME: CLI surface, built with clap's derive API
// ABOUTME: Plain `--format table|json|minimal` output only; rich terminal rendering is explicitly out of scope

pub mod auth;
pub mod call;
pub mod index;
pub mod install;
pub mod mcp_cmd;
pub mod search;
pub mod serve;

use clap::{Parser, Subcommand};

/// Output rendering for commands that print structured data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Aligned plain-text columns.
    Table,
    /// Pretty-printed JSON.
    Json,
    /// One line per result, name only.
    Minimal,
}

/// `please` — an MCP aggregation gateway: index many upstream MCP servers
/// offline, then search/list/get/call them through one small surface.
#[derive(Debug, Parser)]
#[command(name = "please", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build or refresh the tool index.
    Index(index::IndexArgs),
    /// Search the index for tools matching a query.
    Search(search::SearchArgs),
    /// Call an indexed tool on its upstream server.
    Call(call::CallArgs),
    /// Run the gateway as an MCP server over stdio.
    Serve(serve::ServeArgs),
    /// Manage upstream server configuration entries.
    #[command(subcommand)]
    Mcp(mcp_cmd::McpCommand),
    /// Run or clear an OAuth 2.1 session for an upstream server.
    Auth(auth::AuthArgs),
    /// Write IDE-specific wiring so a host can launch this gateway (interface only).
    Install(install::InstallArgs),
    /// Shorthand for `call <tool-name>`: `please <tool-name> --args '...'`.
    #[command(external_subcommand)]
    Invoke(Vec<String>),
}

/// Parse a shorthand `please <tool-name> [flags...]` invocation the same way
/// `please call <tool-name> [flags...]` would be parsed.
///
/// # Errors
///
/// Returns a configuration error if the raw argument list doesn't parse as
/// [`call::CallArgs`].
fn parse_shorthand_call(raw: Vec<String>) -> crate::errors::AppResult<call::CallArgs> {
    #[derive(Debug, Parser)]
    struct Shorthand {
        #[command(flatten)]
        call: call::CallArgs,
    }

    Shorthand::try_parse_from(std::iter::once("please".to_owned()).chain(raw))
        .map(|shorthand| shorthand.call)
        .map_err(|e| crate::errors::AppError::config(format!("invalid tool invocation: {e}")))
}

/// Parse an index scope name shared by `index`, `search`, and `list` subcommands.
///
/// # Errors
///
/// Returns a configuration error naming the unrecognized scope.
pub fn index_scope(s: &str) -> crate::errors::AppResult<crate::config::model::IndexScope> {
    use crate::config::model::IndexScope;
    match s {
        "user" => Ok(IndexScope::User),
        "project" => Ok(IndexScope::Project),
        "all" => Ok(IndexScope::All),
        other => Err(crate::errors::AppError::config(format!(
            "unknown scope '{other}', expected user/project/all"
        ))),
    }
}

/// Dispatch a parsed CLI invocation.
///
/// # Errors
///
/// Returns whatever error the dispatched subcommand returns.
pub async fn run(cli: Cli) -> crate::errors::AppResult<()> {
    match cli.command {
        Command::Index(args) => index::run(args).await,
        Command::Search(args) => search::run(args).await,
        Command::Call(args) => call::run(args).await,
        Command::Serve(args) => serve::run(args).await,
        Command::Mcp(cmd) => mcp_cmd::run(cmd).await,
        Command::Auth(args) => auth::run(args).await,
        Command::Install(args) => install::run(args).await,
        Command::Invoke(raw) => call::run(parse_shorthand_call(raw)?).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_parses_like_call() {
        let parsed = parse_shorthand_call(vec![
            "github__search_issues".to_owned(),
            "--args".to_owned(),
            r#"{"query":"open"}"#.to_owned(),
        ])
        .unwrap();
        assert_eq!(parsed.name, "github__search_issues");
        assert_eq!(parsed.args.as_deref(), Some(r#"{"query":"open"}"#));
    }

    #[test]
    fn shorthand_requires_a_tool_name() {
        assert!(parse_shorthand_call(vec![]).is_err());
    }
}
