// ABOUTME: `please auth` — run or clear an OAuth 2.1 session for one upstream server

use clap::Args;

use crate::config::environment::GatewayEnvironment;
use crate::config::model::Authorization;
use crate::config::resolver::ConfigResolver;
use crate::errors::{AppError, AppResult};
use crate::oauth::OAuthManager;

#[derive(Debug, Args)]
pub struct AuthArgs {
    /// The configured server name to authorize.
    pub name: String,
    /// Wipe the stored session instead of running the authorization flow.
    #[arg(long)]
    pub clear: bool,
    /// Print the authorization URL instead of launching a browser.
    #[arg(long)]
    pub headless: bool,
}

/// Run `please auth`.
///
/// # Errors
///
/// Returns a configuration error if the server is unconfigured or not
/// oauth2-protected, or an authentication error if the flow itself fails.
pub async fn run(args: AuthArgs) -> AppResult<()> {
    let cwd = std::env::current_dir()?;
    let resolver = ConfigResolver::new(cwd)?;
    let env_config = GatewayEnvironment::from_env();
    let manager = OAuthManager::new(env_config.oauth_callback_port, args.headless || env_config.headless)?;

    if args.clear {
        manager.token_store().clear_session(&args.name)?;
        println!("Cleared session for '{}'.", args.name);
        return Ok(());
    }

    let servers = resolver.merged_for_discovery();
    let config = servers.get(&args.name).ok_or_else(|| {
        AppError::config(format!("server '{}' is not configured", args.name))
            .with_hint("run `please mcp add` first")
    })?;

    let Authorization::Oauth2 { .. } = &config.authorization else {
        return Err(AppError::config(format!(
            "server '{}' is not configured for oauth2",
            args.name
        )));
    };

    let resource_url = config.url.clone().ok_or_else(|| {
        AppError::config(format!(
            "server '{}' has no `url` to derive a resource origin from",
            args.name
        ))
    })?;

    manager
        .authorize(&args.name, &resource_url, &config.authorization)
        .await?;
    println!("Authorized '{}'.", args.name);
    Ok(())
}
