// ABOUTME: Logging configuration and structured logging setup
// ABOUTME: Configures log levels and formatters for the gateway CLI and server processes

use anyhow::Result;
use std::env;
use std::io;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log output format.
#[derive(Debug, Clone)]
pub enum LogFormat {
    /// JSON lines, for machine consumption.
    Json,
    /// Human-readable, for a terminal.
    Pretty,
    /// Single line per event, no spans.
    Compact,
}

/// Logging configuration, resolved from the environment.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `RUST_LOG`-style filter directive.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Include file/line in output (noisy; off by default).
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Build configuration from `RUST_LOG` / `LOG_FORMAT` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
        let format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        };
        Self {
            level,
            format,
            include_location: env::var("LOG_INCLUDE_LOCATION").is_ok(),
        }
    }

    /// Install the global tracing subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if a subscriber has already been installed.
    pub fn init(&self) -> Result<()> {
        let env_filter = EnvFilter::try_new(&self.level)
            .unwrap_or_else(|_| EnvFilter::new("info"))
            .add_directive("hyper=warn".parse()?)
            .add_directive("reqwest=warn".parse()?)
            .add_directive("rmcp=info".parse()?);

        let registry = tracing_subscriber::registry().with(env_filter);

        match self.format {
            LogFormat::Json => {
                registry
                    .with(
                        fmt::layer()
                            .with_file(self.include_location)
                            .with_line_number(self.include_location)
                            .with_target(true)
                            .with_writer(io::stderr)
                            .with_span_events(FmtSpan::NONE)
                            .json(),
                    )
                    .try_init()
                    .map_err(|e| anyhow::anyhow!("logging already initialized: {e}"))?;
            }
            LogFormat::Pretty => {
                registry
                    .with(
                        fmt::layer()
                            .with_file(self.include_location)
                            .with_line_number(self.include_location)
                            .with_target(true)
                            .with_writer(io::stderr)
                            .with_span_events(FmtSpan::NONE),
                    )
                    .try_init()
                    .map_err(|e| anyhow::anyhow!("logging already initialized: {e}"))?;
            }
            LogFormat::Compact => {
                registry
                    .with(
                        fmt::layer()
                            .compact()
                            .with_file(false)
                            .with_line_number(false)
                            .with_target(false)
                            .with_writer(io::stderr)
                            .with_span_events(FmtSpan::NONE),
                    )
                    .try_init()
                    .map_err(|e| anyhow::anyhow!("logging already initialized: {e}"))?;
            }
        }

        info!(version = %env!("CARGO_PKG_VERSION"), "please-mcp-gateway logging initialized");
        Ok(())
    }
}

/// Initialize logging from the environment; convenience wrapper for binaries.
///
/// # Errors
///
/// Returns an error if a subscriber has already been installed.
pub fn init_from_env() -> Result<()> {
    LoggingConfig::from_env().init()
}
