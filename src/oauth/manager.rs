// ABOUTME: OAuth 2.1 authorization-code + PKCE manager, generalized to any upstream server

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::config::model::Authorization;
use crate::constants::{
    DEFAULT_OAUTH_CALLBACK_PORT, OAUTH_CALLBACK_PORT_RANGE, OAUTH_CALLBACK_TIMEOUT_SECS,
};
use crate::errors::{AppError, AppResult};

use super::discovery::{self, AuthServerMetadata};
use super::pkce::PkcePair;
use super::token_store::{ClientInfo, TokenSet, TokenStore};

/// Coarse phase reported while a flow is running, useful for CLI progress output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthPhase {
    /// Fetching protected-resource / authorization-server metadata.
    Discovering,
    /// Performing RFC 7591 dynamic client registration.
    Registering,
    /// Local callback server is up, waiting on the browser redirect.
    AwaitingCallback,
    /// Exchanging the authorization code for tokens.
    Exchanging,
    /// A valid token set is in hand.
    Authorized,
    /// Using a refresh token to mint a new access token.
    Refreshing,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

struct CallbackState {
    expected_state: String,
    sender: Mutex<Option<oneshot::Sender<AppResult<String>>>>,
}

/// Drives the full OAuth 2.1 authorization-code + PKCE flow for an upstream server.
pub struct OAuthManager {
    client: reqwest::Client,
    store: TokenStore,
    callback_port_start: u16,
    headless: bool,
}

impl OAuthManager {
    /// Build a manager using the default token store location.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the home directory cannot be determined.
    pub fn new(callback_port_start: u16, headless: bool) -> AppResult<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            store: TokenStore::new()?,
            callback_port_start,
            headless,
        })
    }

    /// Access the underlying token store (used by the CLI's `auth`/`auth --clear` verbs).
    #[must_use]
    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    /// Run the full authorization flow for `server_name`, storing the resulting
    /// tokens, and returning them.
    ///
    /// # Errors
    ///
    /// Returns an authentication error at any stage: discovery failure,
    /// registration refusal, callback timeout, state mismatch, or a non-2xx
    /// token exchange response.
    pub async fn authorize(
        &self,
        server_name: &str,
        resource_url: &str,
        oauth_config: &Authorization,
    ) -> AppResult<TokenSet> {
        let (scopes, resource, explicit_server) = match oauth_config {
            Authorization::Oauth2 {
                scopes,
                resource,
                authorization_server,
            } => (
                scopes.clone().unwrap_or_default(),
                resource.clone(),
                authorization_server.clone(),
            ),
            _ => {
                return Err(AppError::config(format!(
                    "server '{server_name}' is not configured for oauth2"
                )))
            }
        };

        info!(server_name, "discovering oauth metadata");
        let resource_origin = resource.unwrap_or_else(|| origin_of(resource_url));
        let authorization_server_origin = match explicit_server {
            Some(server) => server,
            None => {
                match discovery::discover_protected_resource(&self.client, &resource_origin).await?
                {
                    Some(metadata) if !metadata.authorization_servers.is_empty() => {
                        metadata.authorization_servers[0].clone()
                    }
                    _ => resource_origin.clone(),
                }
            }
        };

        let metadata =
            discovery::discover_authorization_server(&self.client, &authorization_server_origin)
                .await?;

        let redirect_port = self.find_free_port().await?;
        let redirect_uri = format!("http://127.0.0.1:{redirect_port}/callback");

        info!(server_name, "registering oauth client");
        let client_info = self
            .client_info_for(server_name, &authorization_server_origin, &metadata, &redirect_uri)
            .await?;

        let pkce = metadata.supports_pkce_s256().then(PkcePair::generate);
        let state = super::pkce::generate_state();

        let auth_url = build_authorization_url(
            &metadata,
            &client_info,
            &redirect_uri,
            pkce.as_ref(),
            &state,
            &scopes,
        )?;

        info!(server_name, port = redirect_port, "awaiting oauth callback");
        let code = self
            .await_callback(redirect_port, state, auth_url)
            .await?;

        info!(server_name, "exchanging authorization code for tokens");
        let tokens = self
            .exchange_code(&metadata, &client_info, &code, &redirect_uri, pkce.as_ref())
            .await?;

        self.store.save_session(server_name, &tokens)?;
        Ok(tokens)
    }

    /// Refresh a stored session using its refresh token.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if there is no stored session, it has
    /// no refresh token, or the authorization server refuses the grant.
    pub async fn refresh(
        &self,
        server_name: &str,
        authorization_server_origin: &str,
    ) -> AppResult<TokenSet> {
        let existing = self
            .store
            .load_session(server_name)?
            .ok_or_else(|| AppError::auth_required(server_name))?;
        let refresh_token = existing
            .refresh_token
            .clone()
            .ok_or_else(|| AppError::auth(format!("server '{server_name}' has no refresh token")))?;

        let metadata =
            discovery::discover_authorization_server(&self.client, authorization_server_origin)
                .await?;
        let client_info = self
            .store
            .load_client_info(authorization_server_origin)?
            .ok_or_else(|| {
                AppError::auth(format!(
                    "no registered client for '{authorization_server_origin}'"
                ))
            })?;

        let mut form = vec![
            ("grant_type", "refresh_token".to_owned()),
            ("refresh_token", refresh_token),
            ("client_id", client_info.client_id.clone()),
        ];
        if let Some(secret) = &client_info.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        let tokens = self.post_token_request(&metadata.token_endpoint, &form).await?;
        self.store.update_tokens(server_name, &tokens)?;
        Ok(tokens)
    }

    async fn client_info_for(
        &self,
        server_name: &str,
        authorization_server_origin: &str,
        metadata: &AuthServerMetadata,
        redirect_uri: &str,
    ) -> AppResult<ClientInfo> {
        if let Some(existing) = self.store.load_client_info(authorization_server_origin)? {
            return Ok(existing);
        }

        let registration_endpoint = metadata.registration_endpoint.clone().ok_or_else(|| {
            AppError::auth(format!(
                "'{authorization_server_origin}' supports no dynamic client registration \
                 and no client was pre-configured"
            ))
        })?;

        let body = serde_json::json!({
            "client_name": format!("please-mcp-gateway ({server_name})"),
            "redirect_uris": [redirect_uri],
            "grant_types": ["authorization_code", "refresh_token"],
            "response_types": ["code"],
            "token_endpoint_auth_method": "none",
        });

        let response = self
            .client
            .post(&registration_endpoint)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::auth(format!(
                "dynamic client registration at '{registration_endpoint}' failed: HTTP {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct RegistrationResponse {
            client_id: String,
            #[serde(default)]
            client_secret: Option<String>,
        }
        let parsed: RegistrationResponse = response.json().await?;
        let client_info = ClientInfo {
            client_id: parsed.client_id,
            client_secret: parsed.client_secret,
            redirect_uris: vec![redirect_uri.to_owned()],
        };
        self.store
            .save_client_info(authorization_server_origin, &client_info)?;
        Ok(client_info)
    }

    async fn find_free_port(&self) -> AppResult<u16> {
        for offset in 0..OAUTH_CALLBACK_PORT_RANGE {
            let candidate = self.callback_port_start + offset;
            if TcpListener::bind(("127.0.0.1", candidate)).await.is_ok() {
                return Ok(candidate);
            }
        }
        Err(AppError::auth(format!(
            "no free callback port in range {}-{}",
            self.callback_port_start,
            self.callback_port_start + OAUTH_CALLBACK_PORT_RANGE - 1
        ))
        .with_hint("close other `mcp auth` sessions and retry"))
    }

    async fn await_callback(
        &self,
        port: u16,
        expected_state: String,
        auth_url: url::Url,
    ) -> AppResult<String> {
        let (tx, rx) = oneshot::channel();
        let state = Arc::new(CallbackState {
            expected_state,
            sender: Mutex::new(Some(tx)),
        });

        let app = Router::new()
            .route("/callback", get(callback_handler))
            .with_state(state);

        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        if self.headless {
            println!("Open this URL to authorize: {auth_url}");
        } else if open::that(auth_url.as_str()).is_err() {
            warn!("failed to launch browser, printing URL instead");
            println!("Open this URL to authorize: {auth_url}");
        }

        let result = tokio::time::timeout(
            Duration::from_secs(OAUTH_CALLBACK_TIMEOUT_SECS),
            rx,
        )
        .await;

        server.abort();

        match result {
            Ok(Ok(Ok(code))) => Ok(code),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(AppError::auth("callback server closed unexpectedly")),
            Err(_) => Err(AppError::auth("timed out waiting for the oauth callback")),
        }
    }

    async fn exchange_code(
        &self,
        metadata: &AuthServerMetadata,
        client_info: &ClientInfo,
        code: &str,
        redirect_uri: &str,
        pkce: Option<&PkcePair>,
    ) -> AppResult<TokenSet> {
        let mut form = vec![
            ("grant_type", "authorization_code".to_owned()),
            ("code", code.to_owned()),
            ("redirect_uri", redirect_uri.to_owned()),
            ("client_id", client_info.client_id.clone()),
        ];
        if let Some(pkce) = pkce {
            form.push(("code_verifier", pkce.verifier.clone()));
        }
        if let Some(secret) = &client_info.client_secret {
            form.push(("client_secret", secret.clone()));
        }
        self.post_token_request(&metadata.token_endpoint, &form).await
    }

    async fn post_token_request(
        &self,
        token_endpoint: &str,
        form: &[(&str, String)],
    ) -> AppResult<TokenSet> {
        let response = self.client.post(token_endpoint).form(form).send().await?;
        if !response.status().is_success() {
            return Err(AppError::auth(format!(
                "token endpoint '{token_endpoint}' returned HTTP {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            #[serde(default)]
            refresh_token: Option<String>,
            #[serde(default)]
            expires_in: Option<i64>,
            #[serde(default = "default_token_type")]
            token_type: String,
            #[serde(default)]
            scope: Option<String>,
        }
        fn default_token_type() -> String {
            "Bearer".into()
        }

        let parsed: TokenResponse = response.json().await?;
        Ok(TokenSet {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            expires_at: parsed
                .expires_in
                .map(|secs| chrono::Utc::now() + chrono::Duration::seconds(secs)),
            token_type: parsed.token_type,
            scope: parsed.scope,
        })
    }
}

async fn callback_handler(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> Html<String> {
    let result = if let Some(error) = params.error {
        Err(AppError::auth(format!(
            "authorization server returned error '{error}': {}",
            params.error_description.unwrap_or_default()
        )))
    } else {
        match (params.code, params.state) {
            (Some(code), Some(returned_state)) if returned_state == state.expected_state => {
                Ok(code)
            }
            (Some(_), Some(_)) => Err(AppError::auth("oauth callback state mismatch")),
            _ => Err(AppError::auth("oauth callback missing code or state")),
        }
    };

    let message = match &result {
        Ok(_) => "Authorization complete. You can close this tab.".to_owned(),
        Err(e) => format!("Authorization failed: {e}"),
    };

    if let Some(sender) = state.sender.lock().unwrap().take() {
        let _ = sender.send(result);
    }

    Html(format!("<html><body><p>{message}</p></body></html>"))
}

fn origin_of(resource_url: &str) -> String {
    url::Url::parse(resource_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| format!("{}://{h}", u.scheme())))
        .unwrap_or_else(|| resource_url.to_owned())
}

fn build_authorization_url(
    metadata: &AuthServerMetadata,
    client_info: &ClientInfo,
    redirect_uri: &str,
    pkce: Option<&PkcePair>,
    state: &str,
    scopes: &[String],
) -> AppResult<url::Url> {
    let mut url = url::Url::parse(&metadata.authorization_endpoint)?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("response_type", "code");
        query.append_pair("client_id", &client_info.client_id);
        query.append_pair("redirect_uri", redirect_uri);
        if let Some(pkce) = pkce {
            query.append_pair("code_challenge", &pkce.challenge);
            query.append_pair("code_challenge_method", "S256");
        }
        query.append_pair("state", state);
        query.append_pair("prompt", "consent");
        if !scopes.is_empty() {
            query.append_pair("scope", &scopes.join(" "));
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client_info() -> ClientInfo {
        ClientInfo {
            client_id: "abc".into(),
            client_secret: None,
            redirect_uris: vec!["http://127.0.0.1:3334/callback".into()],
        }
    }

    #[test]
    fn authorization_url_carries_pkce_state_and_consent() {
        let metadata = AuthServerMetadata::conventional("https://auth.example.com");
        let client_info = test_client_info();
        let pkce = PkcePair::generate();
        let url = build_authorization_url(
            &metadata,
            &client_info,
            "http://127.0.0.1:3334/callback",
            Some(&pkce),
            "state123",
            &["read".into()],
        )
        .unwrap();

        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("response_type").unwrap(), "code");
        assert_eq!(pairs.get("client_id").unwrap(), "abc");
        assert_eq!(pairs.get("code_challenge_method").unwrap(), "S256");
        assert_eq!(pairs.get("state").unwrap(), "state123");
        assert_eq!(pairs.get("prompt").unwrap(), "consent");
        assert_eq!(pairs.get("scope").unwrap(), "read");
    }

    #[test]
    fn authorization_url_omits_pkce_when_not_requested() {
        let metadata = AuthServerMetadata::conventional("https://auth.example.com");
        let client_info = test_client_info();
        let url = build_authorization_url(
            &metadata,
            &client_info,
            "http://127.0.0.1:3334/callback",
            None,
            "state123",
            &[],
        )
        .unwrap();

        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert!(!pairs.contains_key("code_challenge"));
        assert!(!pairs.contains_key("code_challenge_method"));
        assert_eq!(pairs.get("prompt").unwrap(), "consent");
    }

    #[test]
    fn metadata_without_s256_support_disables_pkce() {
        let mut metadata = AuthServerMetadata::conventional("https://auth.example.com");
        metadata.code_challenge_methods_supported = vec!["plain".to_owned()];
        assert!(!metadata.supports_pkce_s256());
    }

    #[test]
    fn origin_of_strips_path() {
        assert_eq!(
            origin_of("https://mcp.example.com/v1/tools"),
            "https://mcp.example.com"
        );
    }
}
