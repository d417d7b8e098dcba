// ABOUTME: Centralized error handling and error types for the gateway
// ABOUTME: Defines error codes, the unified AppError, and conversions from common library errors

use serde::Serialize;
use thiserror::Error;

/// Standard error codes used throughout the gateway.
///
/// These map onto the error kinds enumerated in the design's error-handling
/// section: configuration, authentication, transport, corpus, index
/// integrity, and upstream tool errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Invalid JSON, unknown provider tag, bad scope, missing command/url, etc.
    Configuration,
    /// No session, refresh failed, registration refused, PKCE/state violation, callback timeout.
    Authentication,
    /// Connection timeout, stream error, protocol error from an upstream.
    Transport,
    /// Search mode requires embeddings but none exist, or a dimension mismatch.
    Corpus,
    /// Version-major mismatch, unparseable file, missing build metadata.
    IndexIntegrity,
    /// The upstream tool itself returned `isError: true`.
    UpstreamTool,
    /// Anything not covered above.
    Internal,
}

impl ErrorCode {
    /// Short machine-readable tag, used as the typed-failure discriminant in §4.M.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Configuration => "CONFIGURATION",
            Self::Authentication => "AUTH_REQUIRED",
            Self::Transport => "EXECUTION_FAILED",
            Self::Corpus => "CORPUS",
            Self::IndexIntegrity => "INDEX_INTEGRITY",
            Self::UpstreamTool => "UPSTREAM_TOOL_ERROR",
            Self::Internal => "INTERNAL",
        }
    }
}

/// The gateway's unified error type.
#[derive(Debug, Clone, Error)]
#[error("{code:?}: {message}")]
pub struct AppError {
    /// Which error kind this is.
    pub code: ErrorCode,
    /// Human-readable message, safe to print to the operator.
    pub message: String,
    /// A remediation hint, e.g. naming the `mcp auth <name>` CLI verb.
    pub hint: Option<String>,
}

impl AppError {
    /// Create a new error with no hint.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a remediation hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Configuration error constructor.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Configuration, message)
    }

    /// Authentication error constructor.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Authentication, message)
    }

    /// Authentication error naming the `mcp auth <name>` remedy.
    #[must_use]
    pub fn auth_required(server_name: &str) -> Self {
        Self::new(
            ErrorCode::Authentication,
            format!("no usable OAuth session for '{server_name}'"),
        )
        .with_hint(format!("run `mcp auth {server_name}` to authorize"))
    }

    /// Transport error constructor.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Transport, message)
    }

    /// Corpus error constructor (search mode unavailable, dimension mismatch).
    #[must_use]
    pub fn corpus(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Corpus, message)
    }

    /// Index integrity error constructor.
    #[must_use]
    pub fn index_integrity(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IndexIntegrity, message)
    }

    /// Upstream tool error constructor, for an `isError: true` call result.
    #[must_use]
    pub fn upstream_tool(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamTool, message)
    }

    /// Not-found convenience constructor (configuration-class).
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self::new(ErrorCode::Configuration, format!("{resource} not found"))
    }

    /// Internal error constructor.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::new(ErrorCode::Internal, format!("IO error: {error}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(ErrorCode::Configuration, format!("JSON error: {error}"))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(ErrorCode::Internal, error.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        Self::new(ErrorCode::Transport, format!("HTTP error: {error}"))
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::new(ErrorCode::Configuration, format!("invalid URL: {error}"))
    }
}

/// Result type alias used throughout the crate.
pub type AppResult<T> = Result<T, AppError>;
