// ABOUTME: Gateway module: the merged-corpus cache and the rmcp server exposing the search/list/get surface

pub mod server;

pub use server::GatewayServer;
