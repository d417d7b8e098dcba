// ABOUTME: Index Store: persists and loads the index JSON at its scope-derived path

use std::path::{Path, PathBuf};

use crate::config::model::IndexScope;
use crate::constants::{DOT_DIR, INDEX_FORMAT_VERSION};
use crate::errors::{AppError, AppResult};

use super::model::{BuildMetadata, PersistedIndex};

/// Reads and writes the persisted index file for a given scope.
pub struct IndexStore {
    home_dir: PathBuf,
    cwd: PathBuf,
}

impl IndexStore {
    /// Build a store rooted at the process's home and current directory.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the home directory cannot be determined.
    pub fn new(cwd: impl Into<PathBuf>) -> AppResult<Self> {
        let home_dir = crate::config::environment::GatewayEnvironment::from_env()
            .home_dir()
            .ok_or_else(|| AppError::config("could not determine home directory"))?;
        Ok(Self {
            home_dir,
            cwd: cwd.into(),
        })
    }

    /// Build a store rooted at explicit directories, for tests.
    #[must_use]
    pub fn at(home_dir: PathBuf, cwd: PathBuf) -> Self {
        Self { home_dir, cwd }
    }

    /// Where a scope's index lives: `<cwd>/.please/mcp/index.json` for
    /// project/all scope, `$HOME/.please/mcp/index.json` for user scope.
    #[must_use]
    pub fn path_for(&self, scope: IndexScope) -> PathBuf {
        let root = match scope {
            IndexScope::User => &self.home_dir,
            IndexScope::Project | IndexScope::All => &self.cwd,
        };
        root.join(DOT_DIR).join("mcp").join("index.json")
    }

    /// Load a scope's index. Returns `Ok(None)` if the file is missing,
    /// unparseable, or fails the major-version gate.
    ///
    /// # Errors
    ///
    /// Returns an error only for IO failures other than "not found".
    pub fn load(&self, scope: IndexScope) -> AppResult<Option<PersistedIndex>> {
        let path = self.path_for(scope);
        load_from_path(&path)
    }

    /// Persist an index at its scope-derived path, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, scope: IndexScope, index: &PersistedIndex) -> AppResult<()> {
        let path = self.path_for(scope);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(index)?;
        std::fs::write(&path, bytes)?;
        Ok(())
    }

    /// Load an index from an explicit path instead of a scope-derived one,
    /// for `--index` overrides on `search`/`call`/`serve`. Same leniency as
    /// [`Self::load`]: a missing or corrupt file loads as `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error only for IO failures other than "not found".
    pub fn load_explicit(path: &Path) -> AppResult<Option<PersistedIndex>> {
        load_from_path(path)
    }

    /// Load just the build metadata, without deserializing the full tool list.
    ///
    /// # Errors
    ///
    /// Returns an error only for IO failures other than "not found".
    pub fn load_metadata(&self, scope: IndexScope) -> AppResult<Option<BuildMetadata>> {
        Ok(self.load(scope)?.map(|i| i.metadata))
    }

    /// An empty index for `scope`, stamped with the given build metadata.
    #[must_use]
    pub fn create_empty(&self, metadata: BuildMetadata) -> PersistedIndex {
        PersistedIndex::empty(metadata)
    }
}

fn load_from_path(path: &Path) -> AppResult<Option<PersistedIndex>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let index: PersistedIndex = match serde_json::from_slice(&bytes) {
        Ok(index) => index,
        Err(_) => return Ok(None),
    };

    if major_version(&index.metadata.format_version) != major_version(INDEX_FORMAT_VERSION) {
        return Ok(None);
    }

    Ok(Some(index))
}

fn major_version(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolver::ConfigFingerprints;

    fn metadata() -> BuildMetadata {
        BuildMetadata {
            format_version: INDEX_FORMAT_VERSION.to_owned(),
            gateway_version: "0.1.0".into(),
            scope: IndexScope::Project,
            embedding_provider: None,
            excluded_servers: vec![],
            config_fingerprints: ConfigFingerprints::default(),
            built_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn round_trips_an_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::at(dir.path().join("home"), dir.path().join("proj"));
        let index = store.create_empty(metadata());
        store.save(IndexScope::Project, &index).unwrap();
        let loaded = store.load(IndexScope::Project).unwrap().unwrap();
        assert_eq!(loaded.tools.len(), 0);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::at(dir.path().join("home"), dir.path().join("proj"));
        assert!(store.load(IndexScope::Project).unwrap().is_none());
    }

    #[test]
    fn major_version_mismatch_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::at(dir.path().join("home"), dir.path().join("proj"));
        let mut index = store.create_empty(metadata());
        index.metadata.format_version = "2.0.0".into();
        store.save(IndexScope::Project, &index).unwrap();
        assert!(store.load(IndexScope::Project).unwrap().is_none());
    }

    #[test]
    fn corrupt_file_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::at(dir.path().join("home"), dir.path().join("proj"));
        let path = store.path_for(IndexScope::Project);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        assert!(store.load(IndexScope::Project).unwrap().is_none());
    }

    #[test]
    fn load_explicit_reads_an_arbitrary_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::at(dir.path().join("home"), dir.path().join("proj"));
        let index = store.create_empty(metadata());
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, serde_json::to_vec(&index).unwrap()).unwrap();
        assert!(IndexStore::load_explicit(&path).unwrap().is_some());
    }

    #[test]
    fn user_and_project_scopes_use_different_roots() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::at(dir.path().join("home"), dir.path().join("proj"));
        assert_ne!(
            store.path_for(IndexScope::User),
            store.path_for(IndexScope::Project)
        );
    }
}
