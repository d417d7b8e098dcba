// ABOUTME: Data model for the persisted tool index
// ABOUTME: A Tool Definition plus its searchable derivations, corpus stats, and build metadata

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::model::IndexScope;
use crate::config::resolver::ConfigFingerprints;

/// One upstream tool's definition, as reported by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool's name, as the upstream sees it (no provenance prefix).
    pub name: String,
    /// Optional human-facing title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The tool's description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The tool's JSON Schema input shape.
    #[serde(default)]
    pub input_schema: serde_json::Value,
}

/// A tool folded into the index, adorned with which upstream it came from
/// and (when embeddings are enabled) its vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedTool {
    /// `<server_name>__<tool.name>` — the name the gateway exposes externally.
    pub name: String,
    /// The name as reported by the upstream.
    pub original_name: String,
    /// Which configured server this tool came from.
    pub server_name: String,
    /// The raw tool definition.
    pub definition: ToolDefinition,
    /// Flattened, tokenizable text derived from name/title/description/schema.
    pub searchable_text: String,
    /// Embedding vector, present only when the index was built with embeddings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Corpus-wide BM25 statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Stats {
    /// Number of documents (tools) the statistics were computed over.
    pub document_count: usize,
    /// Mean document length in tokens, across the corpus.
    pub average_document_length: f64,
    /// Document frequency per token: how many tools contain it at least once.
    pub document_frequency: HashMap<String, usize>,
}

impl Bm25Stats {
    /// The statistics of an empty corpus.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            document_count: 0,
            average_document_length: 0.0,
            document_frequency: HashMap::new(),
        }
    }
}

/// Which embedding provider (if any) produced an index's vectors, recorded so
/// the Regeneration Detector can notice a provider/model/dtype change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingProviderTag {
    /// `local` or `remote`.
    pub location: String,
    /// Model identifier, e.g. `general-purpose` or `text-embedding-3-small`.
    pub model: String,
    /// Quantization, when the provider supports one, e.g. `fp32`, `q8`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,
}

/// Everything recorded about how an index was produced, used by the
/// Regeneration Detector to decide whether a rebuild is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildMetadata {
    /// Index format version this build was written with.
    pub format_version: String,
    /// The gateway's own version at build time.
    pub gateway_version: String,
    /// Which scope this index covers.
    pub scope: IndexScope,
    /// Embedding provider used, if embeddings were built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<EmbeddingProviderTag>,
    /// Server names excluded from this build, sorted for stable comparison.
    #[serde(default)]
    pub excluded_servers: Vec<String>,
    /// Fingerprints of the config files read when this build ran.
    pub config_fingerprints: ConfigFingerprints,
    /// RFC 3339 timestamp of the build.
    pub built_at: String,
}

/// The full persisted index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedIndex {
    /// All indexed tools, deduplicated by name within this build.
    pub tools: Vec<IndexedTool>,
    /// BM25 corpus statistics over `tools`.
    pub bm25_stats: Bm25Stats,
    /// Metadata describing how this index was produced.
    pub metadata: BuildMetadata,
}

impl PersistedIndex {
    /// An empty index stamped with the given metadata.
    #[must_use]
    pub fn empty(metadata: BuildMetadata) -> Self {
        Self {
            tools: Vec::new(),
            bm25_stats: Bm25Stats::empty(),
            metadata,
        }
    }

    /// True if any tool in this index carries an embedding vector.
    #[must_use]
    pub fn has_embeddings(&self) -> bool {
        self.tools.iter().any(|t| t.embedding.is_some())
    }
}
