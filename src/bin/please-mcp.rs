// ABOUTME: Binary entrypoint: parses the CLI, initializes logging, and maps errors to exit codes

use clap::Parser;
use please_mcp_gateway::cli::{run, Cli};

#[tokio::main]
async fn main() {
    if let Err(e) = please_mcp_gateway::logging::init_from_env() {
        eprintln!("failed to initialize logging: {e}");
    }

    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("error: {}", error.message);
        if let Some(hint) = &error.hint {
            eprintln!("hint: {hint}");
        }
        std::process::exit(1);
    }
}
