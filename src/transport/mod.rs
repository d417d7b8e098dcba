// ABOUTME: MCP Transport Client: single-shot connect/list/call over stdio, HTTP, or SSE

pub mod client;

pub use client::{ConnectedUpstream, TransportClient};
