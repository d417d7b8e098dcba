// ABOUTME: On-disk OAuth token and dynamic-client-registration storage
// ABOUTME: One file per upstream server, keyed by an MD5 digest, under ~/.please/oauth/

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::constants::{DOT_DIR, OAUTH_REFRESH_BUFFER_SECS};
use crate::errors::{AppError, AppResult};

/// A stored access/refresh token pair for one upstream server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer access token.
    pub access_token: String,
    /// Refresh token, when the authorization server issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry time, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Token type, almost always `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Space-delimited granted scopes, when returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".into()
}

impl TokenSet {
    /// True when `expires_at` is within the refresh buffer of now, or already past.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(OAUTH_REFRESH_BUFFER_SECS);
                Utc::now() + buffer >= expires_at
            }
            None => false,
        }
    }
}

/// Dynamically registered OAuth client credentials for one authorization server (RFC 7591).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client identifier issued by the authorization server.
    pub client_id: String,
    /// Client secret, for confidential clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Redirect URIs registered for this client.
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// Loads and persists `TokenSet`/`ClientInfo` under `~/.please/oauth/`.
pub struct TokenStore {
    root: PathBuf,
}

impl TokenStore {
    /// A store rooted at `~/.please/oauth`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the home directory cannot be determined.
    pub fn new() -> AppResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::config("could not determine home directory"))?;
        Ok(Self::at(home.join(DOT_DIR).join("oauth")))
    }

    /// A store rooted at an arbitrary directory, for tests.
    #[must_use]
    pub fn at(root: PathBuf) -> Self {
        Self { root }
    }

    fn digest(key: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(key.as_bytes());
        let full = hex::encode(hasher.finalize());
        full[..12].to_owned()
    }

    fn tokens_path(&self, server_name: &str) -> PathBuf {
        self.root
            .join("tokens")
            .join(format!("{}.json", Self::digest(server_name)))
    }

    fn clients_path(&self, authorization_server: &str) -> PathBuf {
        self.root
            .join("clients")
            .join(format!("{}.json", Self::digest(authorization_server)))
    }

    /// Load a server's stored token set, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but fails to parse.
    pub fn load_session(&self, server_name: &str) -> AppResult<Option<TokenSet>> {
        read_json(&self.tokens_path(server_name))
    }

    /// Persist a full token set, creating the parent directory with mode 0700.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save_session(&self, server_name: &str, tokens: &TokenSet) -> AppResult<()> {
        write_json(&self.tokens_path(server_name), tokens)
    }

    /// Update only the token fields after a refresh, preserving nothing the
    /// caller doesn't supply (a refresh response is the new source of truth).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn update_tokens(&self, server_name: &str, tokens: &TokenSet) -> AppResult<()> {
        self.save_session(server_name, tokens)
    }

    /// Remove a server's stored session, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear_session(&self, server_name: &str) -> AppResult<()> {
        let path = self.tokens_path(server_name);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Load dynamically registered client credentials for an authorization server.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but fails to parse.
    pub fn load_client_info(&self, authorization_server: &str) -> AppResult<Option<ClientInfo>> {
        read_json(&self.clients_path(authorization_server))
    }

    /// Persist client credentials for an authorization server.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save_client_info(
        &self,
        authorization_server: &str,
        info: &ClientInfo,
    ) -> AppResult<()> {
        write_json(&self.clients_path(authorization_server), info)
    }

    /// True if a session exists and is not within the refresh buffer of expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored file fails to parse.
    pub fn has_valid_session(&self, server_name: &str) -> AppResult<bool> {
        Ok(self
            .load_session(server_name)?
            .is_some_and(|tokens| !tokens.needs_refresh()))
    }

    /// True if any session file exists, regardless of expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored file fails to parse.
    pub fn has_session(&self, server_name: &str) -> AppResult<bool> {
        Ok(self.load_session(server_name)?.is_some())
    }

    /// True if a stored session exists but is within the refresh buffer or expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored file fails to parse.
    pub fn needs_refresh(&self, server_name: &str) -> AppResult<bool> {
        Ok(self
            .load_session(server_name)?
            .is_some_and(|tokens| tokens.needs_refresh()))
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> AppResult<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
        set_dir_mode(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, &bytes)?;
    set_file_mode(path)?;
    Ok(())
}

#[cfg(unix)]
fn set_dir_mode(path: &Path) -> AppResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_dir_mode(_path: &Path) -> AppResult<()> {
    Ok(())
}

#[cfg(unix)]
fn set_file_mode(path: &Path) -> AppResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path) -> AppResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, TokenStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::at(dir.path().to_path_buf());
        (dir, store)
    }

    #[test]
    fn round_trips_a_session() {
        let (_dir, store) = store();
        let tokens = TokenSet {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
            token_type: "Bearer".into(),
            scope: None,
        };
        store.save_session("server-a", &tokens).unwrap();
        let loaded = store.load_session("server-a").unwrap().unwrap();
        assert_eq!(loaded.access_token, "at");
        assert!(store.has_valid_session("server-a").unwrap());
    }

    #[test]
    fn missing_session_has_no_valid_session() {
        let (_dir, store) = store();
        assert!(!store.has_session("nope").unwrap());
        assert!(!store.has_valid_session("nope").unwrap());
    }

    #[test]
    fn within_refresh_buffer_needs_refresh() {
        let (_dir, store) = store();
        let tokens = TokenSet {
            access_token: "at".into(),
            refresh_token: None,
            expires_at: Some(Utc::now() + chrono::Duration::seconds(10)),
            token_type: "Bearer".into(),
            scope: None,
        };
        store.save_session("server-a", &tokens).unwrap();
        assert!(store.needs_refresh("server-a").unwrap());
        assert!(!store.has_valid_session("server-a").unwrap());
    }

    #[test]
    fn clear_removes_session() {
        let (_dir, store) = store();
        let tokens = TokenSet {
            access_token: "at".into(),
            refresh_token: None,
            expires_at: None,
            token_type: "Bearer".into(),
            scope: None,
        };
        store.save_session("server-a", &tokens).unwrap();
        store.clear_session("server-a").unwrap();
        assert!(!store.has_session("server-a").unwrap());
    }

    #[test]
    fn digest_is_stable_and_distinct() {
        assert_eq!(TokenStore::digest("a"), TokenStore::digest("a"));
        assert_ne!(TokenStore::digest("a"), TokenStore::digest("b"));
        assert_eq!(TokenStore::digest("a").len(), 12);
    }

    #[test]
    fn client_info_round_trips() {
        let (_dir, store) = store();
        let info = ClientInfo {
            client_id: "abc123".into(),
            client_secret: None,
            redirect_uris: vec!["http://127.0.0.1:3334/callback".into()],
        };
        store.save_client_info("https://auth.example.com", &info).unwrap();
        let loaded = store
            .load_client_info("https://auth.example.com")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.client_id, "abc123");
    }
}
