// ABOUTME: Configuration module: data model, multi-scope resolver, and ambient environment

pub mod environment;
pub mod model;
pub mod resolver;

pub use environment::GatewayEnvironment;
pub use model::{Authorization, IndexScope, McpServersFile, Scope, TransportKind, UpstreamServerConfig};
pub use resolver::{ConfigFingerprint, ConfigFingerprints, ConfigResolver};
