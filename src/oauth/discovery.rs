// ABOUTME: OAuth metadata discovery: protected-resource (RFC 9728) and authorization-server (RFC 8414)
// ABOUTME: Falls back to conventional endpoint paths when an authorization server has no metadata document

use serde::Deserialize;
use url::Url;

use crate::errors::{AppError, AppResult};

/// RFC 9728 protected resource metadata: which authorization server(s) protect this resource.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// The canonical resource identifier.
    #[serde(default)]
    pub resource: Option<String>,
    /// Authorization server issuer URLs that protect this resource.
    #[serde(default, rename = "authorization_servers")]
    pub authorization_servers: Vec<String>,
}

/// RFC 8414 authorization server metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthServerMetadata {
    /// The authorization server's issuer identifier.
    pub issuer: String,
    /// Where to send the user for the authorization-code grant.
    pub authorization_endpoint: String,
    /// Where to exchange a code (or refresh token) for tokens.
    pub token_endpoint: String,
    /// Dynamic client registration endpoint (RFC 7591), if supported.
    #[serde(default)]
    pub registration_endpoint: Option<String>,
    /// PKCE code challenge methods this server advertises, e.g. `["S256"]`.
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

impl AuthServerMetadata {
    /// Conventional endpoints at `origin`, used when no metadata document is published.
    /// Assumes S256 support, matching the common convention for PKCE-only servers.
    #[must_use]
    pub fn conventional(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        Self {
            issuer: origin.to_owned(),
            authorization_endpoint: format!("{origin}/authorize"),
            token_endpoint: format!("{origin}/token"),
            registration_endpoint: Some(format!("{origin}/register")),
            code_challenge_methods_supported: vec!["S256".to_owned()],
        }
    }

    /// Whether this server advertises PKCE S256 support.
    #[must_use]
    pub fn supports_pkce_s256(&self) -> bool {
        self.code_challenge_methods_supported
            .iter()
            .any(|m| m == "S256")
    }
}

/// Fetch the protected-resource metadata for an upstream MCP server's origin.
///
/// Returns `Ok(None)` when the server publishes no such document (a 404), since
/// plenty of upstreams are protected by a single known authorization server
/// with no RFC 9728 document at all.
///
/// # Errors
///
/// Returns a transport error on network failure, or a configuration error if
/// the document is present but unparseable.
pub async fn discover_protected_resource(
    client: &reqwest::Client,
    resource_origin: &str,
) -> AppResult<Option<ProtectedResourceMetadata>> {
    let url = well_known_url(resource_origin, "oauth-protected-resource")?;
    fetch_optional(client, &url).await
}

/// Fetch RFC 8414 authorization server metadata, falling back to conventional
/// `/authorize`, `/token`, `/register` paths if no metadata document is published.
///
/// # Errors
///
/// Returns a transport error on network failure.
pub async fn discover_authorization_server(
    client: &reqwest::Client,
    authorization_server_origin: &str,
) -> AppResult<AuthServerMetadata> {
    let url = well_known_url(authorization_server_origin, "oauth-authorization-server")?;
    match fetch_optional(client, &url).await? {
        Some(metadata) => Ok(metadata),
        None => Ok(AuthServerMetadata::conventional(authorization_server_origin)),
    }
}

fn well_known_url(origin: &str, doc: &str) -> AppResult<Url> {
    let mut url = Url::parse(origin)?;
    let existing_path = url.path().trim_matches('/');
    let new_path = if existing_path.is_empty() {
        format!("/.well-known/{doc}")
    } else {
        format!("/.well-known/{doc}/{existing_path}")
    };
    url.set_path(&new_path);
    Ok(url)
}

async fn fetch_optional<T: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    url: &Url,
) -> AppResult<Option<T>> {
    let response = client.get(url.clone()).send().await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !response.status().is_success() {
        return Err(AppError::transport(format!(
            "discovery request to {url} failed: HTTP {}",
            response.status()
        )));
    }
    Ok(Some(response.json::<T>().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_url_no_path() {
        let url = well_known_url("https://auth.example.com", "oauth-authorization-server").unwrap();
        assert_eq!(
            url.as_str(),
            "https://auth.example.com/.well-known/oauth-authorization-server"
        );
    }

    #[test]
    fn well_known_url_with_path_suffix() {
        let url = well_known_url("https://auth.example.com/tenant/a", "oauth-authorization-server")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://auth.example.com/.well-known/oauth-authorization-server/tenant/a"
        );
    }

    #[test]
    fn conventional_endpoints_strip_trailing_slash() {
        let metadata = AuthServerMetadata::conventional("https://auth.example.com/");
        assert_eq!(
            metadata.authorization_endpoint,
            "https://auth.example.com/authorize"
        );
        assert_eq!(metadata.token_endpoint, "https://auth.example.com/token");
    }
}
