// ABOUTME: Process-wide environment resolution
// ABOUTME: CLI flags override environment variables, which override built-in defaults

use std::env;
use std::path::PathBuf;

use crate::constants::{DEFAULT_OAUTH_CALLBACK_PORT, DOT_DIR};

/// Ambient settings resolved once at process start: where `.please` lives,
/// which port the OAuth callback server should try first, and the default
/// embedding provider tag when none is given on the CLI.
#[derive(Debug, Clone)]
pub struct GatewayEnvironment {
    /// Overrides the user-scope home directory; used in tests and CI sandboxes.
    pub home_override: Option<PathBuf>,
    /// First port the OAuth callback server probes.
    pub oauth_callback_port: u16,
    /// `location:model` tag used as a fallback when a command omits
    /// `--provider`; unset unless `PLEASE_DEFAULT_EMBEDDING_PROVIDER` is present.
    pub default_embedding_provider: Option<String>,
    /// Disables the `open`-crate browser launch during `mcp auth`, printing the URL instead.
    pub headless: bool,
}

impl Default for GatewayEnvironment {
    fn default() -> Self {
        Self {
            home_override: None,
            oauth_callback_port: DEFAULT_OAUTH_CALLBACK_PORT,
            default_embedding_provider: None,
            headless: false,
        }
    }
}

impl GatewayEnvironment {
    /// Resolve from the process environment. CLI flags are applied on top of
    /// this by the `cli` module, which takes precedence (spec ambient stack:
    /// CLI flag > environment variable > built-in default).
    #[must_use]
    pub fn from_env() -> Self {
        let mut env_config = Self::default();

        if let Ok(home) = env::var("PLEASE_HOME") {
            env_config.home_override = Some(PathBuf::from(home));
        }
        if let Ok(port) = env::var("PLEASE_OAUTH_CALLBACK_PORT") {
            if let Ok(parsed) = port.parse() {
                env_config.oauth_callback_port = parsed;
            }
        }
        if let Ok(provider) = env::var("PLEASE_DEFAULT_EMBEDDING_PROVIDER") {
            env_config.default_embedding_provider = Some(provider);
        }
        env_config.headless = env::var("PLEASE_HEADLESS").is_ok() || env::var("CI").is_ok();

        env_config
    }

    /// The effective home directory: override, or `dirs::home_dir()`.
    #[must_use]
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.home_override.clone().or_else(dirs::home_dir)
    }

    /// `<home>/.please`.
    #[must_use]
    pub fn dot_dir(&self) -> Option<PathBuf> {
        self.home_dir().map(|h| h.join(DOT_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_without_env() {
        env::remove_var("PLEASE_HOME");
        env::remove_var("PLEASE_OAUTH_CALLBACK_PORT");
        env::remove_var("PLEASE_DEFAULT_EMBEDDING_PROVIDER");
        env::remove_var("PLEASE_HEADLESS");
        env::remove_var("CI");
        let env_config = GatewayEnvironment::from_env();
        assert_eq!(env_config.oauth_callback_port, DEFAULT_OAUTH_CALLBACK_PORT);
        assert_eq!(env_config.default_embedding_provider, None);
        assert!(!env_config.headless);
    }

    #[test]
    #[serial]
    fn reads_overrides() {
        env::set_var("PLEASE_OAUTH_CALLBACK_PORT", "4000");
        env::set_var("PLEASE_DEFAULT_EMBEDDING_PROVIDER", "remote:openai");
        let env_config = GatewayEnvironment::from_env();
        assert_eq!(env_config.oauth_callback_port, 4000);
        assert_eq!(env_config.default_embedding_provider.as_deref(), Some("remote:openai"));
        env::remove_var("PLEASE_OAUTH_CALLBACK_PORT");
        env::remove_var("PLEASE_DEFAULT_EMBEDDING_PROVIDER");
    }
}
