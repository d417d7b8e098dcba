// ABOUTME: Shared constants: the BM25 stop-word set, defaults, and well-known paths
// ABOUTME: Centralizing these avoids magic numbers scattered across the search and index modules

/// The 52-entry English stop-word set used when tokenizing searchable text.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "were", "will", "with", "this", "but", "they",
    "have", "had", "what", "when", "where", "who", "which", "why", "how", "all", "each", "if",
    "about", "into", "through", "during", "before", "after", "above", "below", "between", "not",
    "can", "than", "or",
];

/// Minimum token length after the stop-word filter.
pub const MIN_TOKEN_LEN: usize = 2;

/// Default callback port the OAuth Manager probes first.
pub const DEFAULT_OAUTH_CALLBACK_PORT: u16 = 3334;

/// Default port `please serve --transport http` binds when `--port` is omitted.
pub const DEFAULT_HTTP_SERVE_PORT: u16 = 8877;

/// Number of consecutive ports probed before giving up.
pub const OAUTH_CALLBACK_PORT_RANGE: u16 = 10;

/// PKCE code verifier length (RFC 7636 allows 43-128; we generate a fixed length in range).
pub const OAUTH_CODE_VERIFIER_LENGTH: usize = 64;

/// Hard timeout for the local OAuth callback wait.
pub const OAUTH_CALLBACK_TIMEOUT_SECS: u64 = 300;

/// Refresh a token when within this many seconds of expiry.
pub const OAUTH_REFRESH_BUFFER_SECS: i64 = 300;

/// Default MCP transport connect/list/call timeout.
pub const DEFAULT_MCP_TIMEOUT_SECS: u64 = 30;

/// Batch size for embedding requests during index build.
pub const EMBEDDING_BATCH_SIZE: usize = 32;

/// Default `topK` for search requests.
pub const DEFAULT_TOP_K: usize = 10;

/// RRF fusion constant `k`.
pub const DEFAULT_RRF_K: f64 = 60.0;

/// Multiplier applied to `topK` when fanning out to hybrid sub-strategies.
pub const HYBRID_TOPK_MULTIPLIER: usize = 3;

/// BM25 `k1` parameter (term-frequency saturation).
pub const BM25_K1: f64 = 1.5;

/// BM25 `b` parameter (document-length normalization).
pub const BM25_B: f64 = 0.75;

/// Current index format version (major.minor.patch).
pub const INDEX_FORMAT_VERSION: &str = "1.0.0";

/// The CLI/crate version stamped into build metadata.
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The npm package name the CLI-usage template invokes via `npx`.
pub const CLI_PACKAGE_NAME: &str = "please-mcp-gateway";

/// Root directory name under `$HOME` and under a project checkout.
pub const DOT_DIR: &str = ".please";
