// ABOUTME: `please call` — run one upstream tool by its provenance-adorned name

use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use rmcp::model::CallToolResult;

use crate::config::resolver::ConfigResolver;
use crate::errors::{AppError, AppResult};
use crate::executor::ToolExecutor;
use crate::index::IndexStore;

/// Output rendering for `please call`: either the full result or just the
/// text content, one line per content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CallOutputFormat {
    /// Pretty-printed JSON of the full `CallToolResult`.
    Json,
    /// Text content only, one line per item.
    Minimal,
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// The tool's provenance-adorned name, e.g. `github__search_issues`.
    pub name: String,
    /// Arguments as a JSON object, e.g. `{"query":"is:open"}`. Read from
    /// stdin if omitted; no arguments if stdin is empty too.
    #[arg(long)]
    pub args: Option<String>,
    /// Which index to resolve the tool against.
    #[arg(long, default_value = "project")]
    pub scope: String,
    /// Resolve the tool against a specific index file instead of the
    /// scope-derived one.
    #[arg(long)]
    pub index: Option<PathBuf>,
    /// Output rendering.
    #[arg(long, value_enum, default_value_t = CallOutputFormat::Json)]
    pub format: CallOutputFormat,
}

/// Run `please call`.
///
/// # Errors
///
/// Returns a configuration error for an unknown scope, missing index,
/// malformed arguments JSON, or unresolvable tool/server; an authentication
/// error for a missing or stale oauth2 session; or a transport error if the
/// upstream call itself fails. Also returns an error (exit code 1) if the
/// upstream tool itself reported `isError`.
pub async fn run(args: CallArgs) -> AppResult<()> {
    let cwd = std::env::current_dir()?;
    let resolver = ConfigResolver::new(cwd.clone())?;

    let (tools, servers) = if let Some(explicit_path) = &args.index {
        let index = IndexStore::load_explicit(explicit_path)?.ok_or_else(|| {
            AppError::index_integrity(format!("no index found at {}", explicit_path.display()))
        })?;
        (index.tools, resolver.merged_for_discovery())
    } else {
        let scope = super::index_scope(&args.scope)?;
        let store = IndexStore::new(cwd)?;
        let index = store.load(scope)?.ok_or_else(|| {
            AppError::index_integrity("no index found").with_hint("run `please index` first")
        })?;
        (index.tools, resolver.merged_for_index_scope(scope))
    };

    let arguments = read_arguments(args.args.as_deref())?;

    let executor = ToolExecutor::new()?;
    let result = executor.execute(&args.name, &tools, &servers, arguments).await?;

    render(&result, args.format);

    if result.is_error.unwrap_or(false) {
        return Err(AppError::upstream_tool(format!(
            "'{}' reported an error result",
            args.name
        )));
    }
    Ok(())
}

/// Parse `--args` as a JSON object, falling back to stdin when it's absent.
/// An explicitly empty stdin (nothing piped in) means no arguments at all.
fn read_arguments(
    explicit: Option<&str>,
) -> AppResult<Option<serde_json::Map<String, serde_json::Value>>> {
    let raw = match explicit {
        Some(raw) => Some(raw.to_owned()),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).ok();
            let trimmed = buf.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
    };

    raw.map(|raw| match serde_json::from_str(&raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::config("--args must be a JSON object")),
        Err(e) => Err(AppError::config(format!("invalid --args JSON: {e}"))),
    })
    .transpose()
}

fn render(result: &CallToolResult, format: CallOutputFormat) {
    match format {
        CallOutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result).unwrap_or_default());
        }
        CallOutputFormat::Minimal => {
            let value = serde_json::to_value(result).unwrap_or_default();
            if let Some(items) = value.get("content").and_then(|c| c.as_array()) {
                for item in items {
                    if let Some(text) = item.get("text").and_then(|t| t.as_str()) {
                        println!("{text}");
                    }
                }
            }
        }
    }
}
