// ABOUTME: OAuth 2.1 authorization-code + PKCE support for upstream MCP servers

pub mod discovery;
pub mod manager;
pub mod pkce;
pub mod token_store;

pub use manager::OAuthManager;
pub use token_store::{ClientInfo, TokenSet, TokenStore};
