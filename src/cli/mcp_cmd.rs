// ABOUTME: `please mcp add|remove|list` — manage upstream server entries in a config scope

use clap::Subcommand;

use crate::config::model::{Authorization, Scope, TransportKind, UpstreamServerConfig};
use crate::config::resolver::ConfigResolver;
use crate::errors::AppResult;

#[derive(Debug, Subcommand)]
pub enum McpCommand {
    /// Add or overwrite an upstream server entry.
    Add(AddArgs),
    /// Remove an upstream server entry.
    Remove(RemoveArgs),
    /// List configured servers across all three scopes.
    List(ListArgs),
}

#[derive(Debug, clap::Args)]
pub struct AddArgs {
    /// The name this server is addressed by, e.g. `github`.
    pub name: String,
    /// Which scope to write the entry into.
    #[arg(long, default_value = "project")]
    pub scope: String,
    /// Child process command, for stdio transport.
    #[arg(long)]
    pub command: Option<String>,
    /// Arguments to the child process.
    #[arg(long = "arg")]
    pub args: Vec<String>,
    /// Upstream URL, for http/sse transport.
    #[arg(long)]
    pub url: Option<String>,
    /// Explicit transport override: `stdio`, `http`, or `sse`.
    #[arg(long)]
    pub transport: Option<String>,
    /// A static bearer token, mutually exclusive with `--oauth`.
    #[arg(long)]
    pub bearer_token: Option<String>,
    /// Protect this server with OAuth 2.1 instead of a static token.
    #[arg(long)]
    pub oauth: bool,
}

#[derive(Debug, clap::Args)]
pub struct RemoveArgs {
    /// The server name to remove.
    pub name: String,
    /// Which scope to remove it from.
    #[arg(long, default_value = "project")]
    pub scope: String,
}

#[derive(Debug, clap::Args)]
pub struct ListArgs {}

/// Dispatch one `please mcp` subcommand.
///
/// # Errors
///
/// Returns a configuration error for an unknown scope/transport or invalid
/// server definition, or whatever error the resolver's file IO encounters.
pub async fn run(cmd: McpCommand) -> AppResult<()> {
    let cwd = std::env::current_dir()?;
    let resolver = ConfigResolver::new(cwd)?;

    match cmd {
        McpCommand::Add(args) => {
            let scope = parse_scope(&args.scope)?;
            let transport = args
                .transport
                .as_deref()
                .map(parse_transport)
                .transpose()?;
            let authorization = if args.oauth {
                Authorization::Oauth2 {
                    scopes: None,
                    resource: None,
                    authorization_server: None,
                }
            } else if let Some(token) = args.bearer_token {
                Authorization::Bearer { token }
            } else {
                Authorization::None
            };

            let config = UpstreamServerConfig {
                command: args.command,
                args: if args.args.is_empty() { None } else { Some(args.args) },
                env: None,
                url: args.url,
                transport,
                authorization,
            };
            config.validate(&args.name)?;
            resolver.upsert_server(scope, &args.name, config)?;
            println!("Added '{}' at {scope} scope.", args.name);
        }
        McpCommand::Remove(args) => {
            let scope = parse_scope(&args.scope)?;
            resolver.remove_server(scope, &args.name)?;
            println!("Removed '{}' from {scope} scope.", args.name);
        }
        McpCommand::List(_) => {
            for scope in [Scope::User, Scope::Project, Scope::Local] {
                let file = resolver.load_scope(scope);
                if file.mcp_servers.is_empty() {
                    continue;
                }
                println!("{scope}:");
                let mut names: Vec<&String> = file.mcp_servers.keys().collect();
                names.sort();
                for name in names {
                    let config = &file.mcp_servers[name];
                    println!("  {name} ({:?})", config.effective_transport());
                }
            }
        }
    }
    Ok(())
}

fn parse_scope(s: &str) -> AppResult<Scope> {
    match s {
        "user" => Ok(Scope::User),
        "project" => Ok(Scope::Project),
        "local" => Ok(Scope::Local),
        other => Err(crate::errors::AppError::config(format!(
            "unknown config scope '{other}', expected user/project/local"
        ))),
    }
}

fn parse_transport(s: &str) -> AppResult<TransportKind> {
    match s {
        "stdio" => Ok(TransportKind::Stdio),
        "http" => Ok(TransportKind::Http),
        "sse" => Ok(TransportKind::Sse),
        other => Err(crate::errors::AppError::config(format!(
            "unknown transport '{other}', expected stdio/http/sse"
        ))),
    }
}
