// ABOUTME: Multi-source configuration resolver
// ABOUTME: Loads the three config scopes, merges them for discovery, and fingerprints each file

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::constants::DOT_DIR;
use crate::errors::AppResult;
use crate::gitignore;

use super::model::{McpServersFile, Scope, UpstreamServerConfig};

/// `{exists: false}` or `{exists: true, hash}` — a config file's fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFingerprint {
    /// Whether the file exists.
    pub exists: bool,
    /// SHA-256 hex digest of the file's exact bytes, when it exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl ConfigFingerprint {
    /// The fingerprint of an absent file.
    #[must_use]
    pub const fn absent() -> Self {
        Self {
            exists: false,
            hash: None,
        }
    }

    fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            exists: true,
            hash: Some(hex::encode(hasher.finalize())),
        }
    }
}

/// The three config fingerprints captured at index-build time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFingerprints {
    /// User-scope fingerprint.
    #[serde(default)]
    pub user: ConfigFingerprint,
    /// Project-scope fingerprint.
    #[serde(default)]
    pub project: ConfigFingerprint,
    /// Local-scope fingerprint.
    #[serde(default)]
    pub local: ConfigFingerprint,
}

impl Default for ConfigFingerprint {
    fn default() -> Self {
        Self::absent()
    }
}

/// Resolves and merges the three config scopes for a given working directory.
pub struct ConfigResolver {
    home_dir: PathBuf,
    cwd: PathBuf,
}

impl ConfigResolver {
    /// Build a resolver rooted at the process's home directory and current directory.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the home directory cannot be determined.
    pub fn new(cwd: impl Into<PathBuf>) -> AppResult<Self> {
        let home_dir = super::environment::GatewayEnvironment::from_env()
            .home_dir()
            .ok_or_else(|| crate::errors::AppError::config("could not determine home directory"))?;
        Ok(Self {
            home_dir,
            cwd: cwd.into(),
        })
    }

    /// Path to the user-scope config file.
    #[must_use]
    pub fn user_path(&self) -> PathBuf {
        self.home_dir.join(DOT_DIR).join("mcp.json")
    }

    /// Path to the project-scope config file.
    #[must_use]
    pub fn project_path(&self) -> PathBuf {
        self.cwd.join(DOT_DIR).join("mcp.json")
    }

    /// Path to the local-scope config file.
    #[must_use]
    pub fn local_path(&self) -> PathBuf {
        self.cwd.join(DOT_DIR).join("mcp.local.json")
    }

    /// Path for the given scope.
    #[must_use]
    pub fn path_for(&self, scope: Scope) -> PathBuf {
        match scope {
            Scope::User => self.user_path(),
            Scope::Project => self.project_path(),
            Scope::Local => self.local_path(),
        }
    }

    /// Load one scope's file. A missing or unparseable file is treated as
    /// "absent".
    #[must_use]
    pub fn load_scope(&self, scope: Scope) -> McpServersFile {
        let path = self.path_for(scope);
        load_file_lenient(&path)
    }

    /// Fingerprint one scope's file.
    #[must_use]
    pub fn fingerprint_scope(&self, scope: Scope) -> ConfigFingerprint {
        fingerprint_file(&self.path_for(scope))
    }

    /// All three fingerprints, as stored in build metadata.
    #[must_use]
    pub fn fingerprints(&self) -> ConfigFingerprints {
        ConfigFingerprints {
            user: self.fingerprint_scope(Scope::User),
            project: self.fingerprint_scope(Scope::Project),
            local: self.fingerprint_scope(Scope::Local),
        }
    }

    /// Merge configs for discovery: `user ⊂ project ⊂ local`, last writer wins
    /// on server-name collision.
    #[must_use]
    pub fn merged_for_discovery(&self) -> HashMap<String, UpstreamServerConfig> {
        let mut merged = HashMap::new();
        for scope in [Scope::User, Scope::Project, Scope::Local] {
            merged.extend(self.load_scope(scope).mcp_servers);
        }
        merged
    }

    /// Merge configs for a scope-filtered index build: a `user`-scope index
    /// sees only the user file; a `project`-scope index sees user+project+local.
    #[must_use]
    pub fn merged_for_index_scope(
        &self,
        scope: super::model::IndexScope,
    ) -> HashMap<String, UpstreamServerConfig> {
        match scope {
            super::model::IndexScope::User => self.load_scope(Scope::User).mcp_servers,
            super::model::IndexScope::Project | super::model::IndexScope::All => {
                self.merged_for_discovery()
            }
        }
    }

    /// Write (or update) a single server entry at the given scope, creating the
    /// directory and, for local scope, appending the file to `.gitignore`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory/file cannot be written.
    pub fn upsert_server(
        &self,
        scope: Scope,
        name: &str,
        config: UpstreamServerConfig,
    ) -> AppResult<()> {
        let path = self.path_for(scope);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = load_file_lenient(&path);
        file.mcp_servers.insert(name.to_owned(), config);
        let bytes = serde_json::to_vec_pretty(&file)?;
        std::fs::write(&path, bytes)?;

        if scope == Scope::Local {
            if let Some(dot_dir) = path.parent() {
                gitignore::ensure_ignored(dot_dir, "mcp.local.json")?;
            }
        }
        Ok(())
    }

    /// Remove a server entry from the given scope. No-op if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be rewritten.
    pub fn remove_server(&self, scope: Scope, name: &str) -> AppResult<()> {
        let path = self.path_for(scope);
        let mut file = load_file_lenient(&path);
        if file.mcp_servers.remove(name).is_some() {
            let bytes = serde_json::to_vec_pretty(&file)?;
            std::fs::write(&path, bytes)?;
        }
        Ok(())
    }
}

fn load_file_lenient(path: &Path) -> McpServersFile {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "config file failed to parse, treating as absent");
            McpServersFile::default()
        }),
        Err(_) => {
            debug!(path = %path.display(), "config file absent");
            McpServersFile::default()
        }
    }
}

fn fingerprint_file(path: &Path) -> ConfigFingerprint {
    match std::fs::read(path) {
        Ok(bytes) => ConfigFingerprint::of_bytes(&bytes),
        Err(_) => ConfigFingerprint::absent(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{Authorization, TransportKind};

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn fingerprint_identical_bytes_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcp.json");
        write(&path, r#"{"mcpServers":{}}"#);
        let a = fingerprint_file(&path);
        let b = fingerprint_file(&path);
        assert_eq!(a, b);
        assert!(a.exists);
    }

    #[test]
    fn fingerprint_distinct_bytes_differ() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcp.json");
        write(&path, r#"{"mcpServers":{}}"#);
        let a = fingerprint_file(&path);
        write(&path, r#"{"mcpServers":{"x":{}}}"#);
        let b = fingerprint_file(&path);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let fp = fingerprint_file(&dir.path().join("nope.json"));
        assert!(!fp.exists);
        assert!(fp.hash.is_none());
    }

    #[test]
    fn merge_precedence_local_wins() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        let cwd = dir.path().join("proj");
        std::fs::create_dir_all(&home).unwrap();
        std::fs::create_dir_all(&cwd).unwrap();

        write(
            &home.join(DOT_DIR).join("mcp.json"),
            r#"{"mcpServers":{"shared":{"command":"user-cmd"}}}"#,
        );
        write(
            &cwd.join(DOT_DIR).join("mcp.json"),
            r#"{"mcpServers":{"shared":{"command":"project-cmd"}}}"#,
        );
        write(
            &cwd.join(DOT_DIR).join("mcp.local.json"),
            r#"{"mcpServers":{"shared":{"command":"local-cmd"}}}"#,
        );

        let resolver = ConfigResolver {
            home_dir: home,
            cwd,
        };
        let merged = resolver.merged_for_discovery();
        assert_eq!(
            merged.get("shared").unwrap().command.as_deref(),
            Some("local-cmd")
        );
    }

    #[test]
    fn parse_failure_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcp.json");
        write(&path, "not json at all {{{");
        let file = load_file_lenient(&path);
        assert!(file.mcp_servers.is_empty());
    }

    #[test]
    fn transport_inference() {
        let stdio = UpstreamServerConfig {
            command: Some("node".into()),
            args: None,
            env: None,
            url: None,
            transport: None,
            authorization: Authorization::None,
        };
        assert_eq!(stdio.effective_transport(), TransportKind::Stdio);

        let http = UpstreamServerConfig {
            command: None,
            args: None,
            env: None,
            url: Some("https://example.com/mcp".into()),
            transport: None,
            authorization: Authorization::None,
        };
        assert_eq!(http.effective_transport(), TransportKind::Http);
    }
}
