// ABOUTME: Search Strategy abstraction shared by regex, BM25, embedding, and hybrid search

pub mod bm25;
pub mod embedding_search;
pub mod hybrid;
pub mod orchestrator;
pub mod regex_search;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;
use crate::index::model::IndexedTool;

/// How a result matched the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// A regular-expression match against searchable text.
    Regex,
    /// A BM25 lexical ranking match.
    Bm25,
    /// A cosine-similarity embedding match.
    Embedding,
    /// Produced by fusing two or more strategies.
    Hybrid,
}

/// One ranked result, common across every search strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The tool's externally visible (provenance-adorned) name.
    pub name: String,
    /// Optional title, when the tool defines one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The tool's description.
    pub description: String,
    /// The strategy's score for this result; not comparable across strategies.
    pub score: f64,
    /// Which strategy produced this result.
    pub match_type: MatchType,
}

/// A pluggable search algorithm over an in-memory corpus of indexed tools.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    /// One-time setup over the corpus (building inverted indexes, caches).
    ///
    /// # Errors
    ///
    /// Returns a corpus error if the strategy's preconditions aren't met
    /// (e.g. embedding search initialized over tools with no vectors).
    async fn initialize(&mut self, tools: &[IndexedTool]) -> AppResult<()>;

    /// Search for `query`, returning at most `top_k` results scoring at or
    /// above `threshold`.
    ///
    /// # Errors
    ///
    /// Returns a corpus error if the strategy cannot serve this query.
    async fn search(&self, query: &str, top_k: usize, threshold: f64) -> AppResult<Vec<SearchResult>>;

    /// Release any resources held by `initialize`.
    async fn dispose(&mut self) {}
}
