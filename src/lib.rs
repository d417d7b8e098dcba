// ABOUTME: MCP aggregation gateway: indexes many upstream MCP servers offline and exposes
// ABOUTME: a small search/list/get/call surface to both a CLI operator and a host over stdio

pub mod cli;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod embeddings;
pub mod errors;
pub mod executor;
pub mod gateway;
pub mod gitignore;
pub mod index;
pub mod logging;
pub mod oauth;
pub mod search;
pub mod transport;
