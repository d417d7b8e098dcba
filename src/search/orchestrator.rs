// ABOUTME: Search orchestrator: dispatches to a named strategy and times the request

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::constants::DEFAULT_TOP_K;
use crate::embeddings::EmbeddingProvider;
use crate::errors::{AppError, AppResult};
use crate::index::model::IndexedTool;

use super::bm25::Bm25Search;
use super::embedding_search::EmbeddingSearch;
use super::hybrid::HybridSearch;
use super::regex_search::RegexSearch;
use super::{SearchResult, SearchStrategy};

/// The search mode named by a `search_tools` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Regular-expression matching.
    Regex,
    /// Okapi BM25 lexical ranking.
    Bm25,
    /// Cosine-similarity embedding search.
    Embedding,
    /// BM25 + embedding fused with RRF.
    Hybrid,
}

impl Default for SearchMode {
    fn default() -> Self {
        Self::Hybrid
    }
}

impl SearchMode {
    /// Parse a mode name from the CLI/tool call surface.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the unrecognized mode.
    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "regex" => Ok(Self::Regex),
            "bm25" => Ok(Self::Bm25),
            "embedding" => Ok(Self::Embedding),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(AppError::config(format!("unknown search mode '{other}'"))),
        }
    }
}

/// The result of one `search_tools` invocation, with its wall-clock latency.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    /// Ranked results, already truncated to the requested `top_k`.
    pub results: Vec<SearchResult>,
    /// How long the search took to execute, in milliseconds.
    pub latency_ms: u64,
}

/// Builds the requested strategy over a corpus and runs one query against it.
///
/// This type is deliberately stateless across calls: each `search_tools`
/// invocation gets a fresh strategy instance, initialized from the current
/// in-memory corpus.
pub struct SearchOrchestrator {
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
}

impl SearchOrchestrator {
    /// Build an orchestrator; `embedding_provider` is required for
    /// `embedding`/`hybrid` modes and may be `None` when the index has no vectors.
    #[must_use]
    pub fn new(embedding_provider: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { embedding_provider }
    }

    /// Run one search over `tools`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown mode, or a corpus error
    /// if `embedding`/`hybrid` is requested with no embedding provider
    /// configured or no tools in the corpus carry vectors.
    pub async fn search(
        &self,
        mode: SearchMode,
        tools: &[IndexedTool],
        query: &str,
        top_k: Option<usize>,
        threshold: f64,
    ) -> AppResult<SearchResponse> {
        let top_k = top_k.unwrap_or(DEFAULT_TOP_K);
        let started = Instant::now();

        let results = match mode {
            SearchMode::Regex => {
                let mut strategy = RegexSearch::default();
                strategy.initialize(tools).await?;
                strategy.search(query, top_k, threshold).await?
            }
            SearchMode::Bm25 => {
                let mut strategy = Bm25Search::default();
                strategy.initialize(tools).await?;
                strategy.search(query, top_k, threshold).await?
            }
            SearchMode::Embedding => {
                let provider = self.require_embedding_provider()?;
                let mut strategy = EmbeddingSearch::new(provider);
                strategy.initialize(tools).await?;
                strategy.search(query, top_k, threshold).await?
            }
            SearchMode::Hybrid => {
                let provider = self.require_embedding_provider()?;
                let mut strategy = HybridSearch::new(EmbeddingSearch::new(provider));
                strategy.initialize(tools).await?;
                strategy.search(query, top_k, threshold).await?
            }
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        info!(?mode, result_count = results.len(), latency_ms, "search complete");
        Ok(SearchResponse { results, latency_ms })
    }

    fn require_embedding_provider(&self) -> AppResult<Arc<dyn EmbeddingProvider>> {
        self.embedding_provider.clone().ok_or_else(|| {
            AppError::corpus(
                "this search mode requires an embedding provider, but none is configured",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mode_is_a_config_error() {
        let err = SearchMode::parse("fuzzy").unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::Configuration);
    }

    #[test]
    fn known_modes_parse() {
        assert_eq!(SearchMode::parse("regex").unwrap(), SearchMode::Regex);
        assert_eq!(SearchMode::parse("bm25").unwrap(), SearchMode::Bm25);
        assert_eq!(SearchMode::parse("embedding").unwrap(), SearchMode::Embedding);
        assert_eq!(SearchMode::parse("hybrid").unwrap(), SearchMode::Hybrid);
    }

    #[tokio::test]
    async fn embedding_mode_without_provider_is_a_corpus_error() {
        let orchestrator = SearchOrchestrator::new(None);
        let err = orchestrator
            .search(SearchMode::Embedding, &[], "query", None, 0.0)
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::Corpus);
    }

    #[tokio::test]
    async fn regex_mode_needs_no_provider() {
        let orchestrator = SearchOrchestrator::new(None);
        let response = orchestrator
            .search(SearchMode::Regex, &[], "query", None, 0.0)
            .await
            .unwrap();
        assert!(response.results.is_empty());
    }
}
