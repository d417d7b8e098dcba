// ABOUTME: `please install --ide <id>` — interface only; the per-IDE installer is out of scope

use clap::Args;

use crate::errors::{AppError, AppResult};

const SUPPORTED_IDE_IDS: &[&str] = &["claude-desktop", "cursor", "vscode", "windsurf"];

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Which IDE's MCP configuration this would write into.
    #[arg(long)]
    pub ide: String,
}

/// Run `please install`.
///
/// # Errors
///
/// Always returns a configuration error: writing IDE-specific configuration
/// files is outside this gateway's scope.
pub async fn run(args: InstallArgs) -> AppResult<()> {
    Err(AppError::config(format!(
        "installing into '{}' is not implemented by this gateway",
        args.ide
    ))
    .with_hint(format!(
        "recognized ide ids: {}; wire the gateway into that IDE's MCP config by hand",
        SUPPORTED_IDE_IDS.join(", ")
    )))
}
