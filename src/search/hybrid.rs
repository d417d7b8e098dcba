// ABOUTME: Hybrid search: fuses BM25 and embedding rankings with Reciprocal Rank Fusion

use std::collections::HashMap;

use async_trait::async_trait;

use crate::constants::{DEFAULT_RRF_K, HYBRID_TOPK_MULTIPLIER};
use crate::errors::{AppError, AppResult};
use crate::index::model::IndexedTool;

use super::bm25::Bm25Search;
use super::embedding_search::EmbeddingSearch;
use super::{MatchType, SearchResult, SearchStrategy};

/// Runs BM25 and embedding search concurrently and fuses their rankings with
/// Reciprocal Rank Fusion (`k = 60`). A tool ranked first by both sub-strategies
/// scores `2 / (k + 1)`.
pub struct HybridSearch {
    bm25: Bm25Search,
    embedding: EmbeddingSearch,
}

impl HybridSearch {
    /// Build a hybrid strategy over a BM25 and an embedding sub-strategy.
    #[must_use]
    pub fn new(embedding: EmbeddingSearch) -> Self {
        Self {
            bm25: Bm25Search::default(),
            embedding,
        }
    }
}

#[async_trait]
impl SearchStrategy for HybridSearch {
    async fn initialize(&mut self, tools: &[IndexedTool]) -> AppResult<()> {
        self.bm25.initialize(tools).await?;
        self.embedding.initialize(tools).await?;
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize, threshold: f64) -> AppResult<Vec<SearchResult>> {
        let expanded_k = top_k * HYBRID_TOPK_MULTIPLIER;

        let (bm25_results, embedding_results) = tokio::join!(
            self.bm25.search(query, expanded_k, 0.0),
            self.embedding.search(query, expanded_k, 0.0),
        );
        let bm25_results = bm25_results
            .map_err(|e| AppError::corpus(format!("hybrid search: bm25 side failed: {e}")))?;
        let embedding_results = embedding_results
            .map_err(|e| AppError::corpus(format!("hybrid search: embedding side failed: {e}")))?;

        let mut fused: HashMap<String, (f64, SearchResult)> = HashMap::new();
        for (rank, result) in bm25_results.into_iter().enumerate() {
            accumulate(&mut fused, rank, result);
        }
        for (rank, result) in embedding_results.into_iter().enumerate() {
            accumulate(&mut fused, rank, result);
        }

        let max_score = fused.values().fold(0.0_f64, |max, (score, _)| max.max(*score));

        let mut results: Vec<SearchResult> = fused
            .into_values()
            .map(|(score, mut result)| {
                let normalized = if max_score > 0.0 { score / max_score } else { 0.0 };
                result.score = (normalized * 1000.0).round() / 1000.0;
                result.match_type = MatchType::Hybrid;
                result
            })
            .filter(|r| r.score >= threshold)
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        Ok(results)
    }
}

fn accumulate(fused: &mut HashMap<String, (f64, SearchResult)>, rank: usize, result: SearchResult) {
    let contribution = 1.0 / (DEFAULT_RRF_K + (rank + 1) as f64);
    fused
        .entry(result.name.clone())
        .and_modify(|(score, _)| *score += contribution)
        .or_insert((contribution, result));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingProvider;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedProvider;

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        fn tag(&self) -> crate::index::model::EmbeddingProviderTag {
            crate::index::model::EmbeddingProviderTag {
                location: "local".into(),
                model: "fixed".into(),
                dtype: None,
            }
        }
        fn dimension(&self) -> usize {
            2
        }
        async fn initialize(&self) -> AppResult<()> {
            Ok(())
        }
        async fn embed_batch(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn tool(name: &str, text: &str, vector: Vec<f32>) -> IndexedTool {
        IndexedTool {
            name: name.to_owned(),
            original_name: name.to_owned(),
            server_name: "server".into(),
            definition: crate::index::model::ToolDefinition {
                name: name.to_owned(),
                title: None,
                description: Some(text.to_owned()),
                input_schema: serde_json::Value::Null,
            },
            searchable_text: text.to_owned(),
            embedding: Some(vector),
        }
    }

    #[tokio::test]
    async fn top_result_scores_one_after_normalization() {
        let mut strategy = HybridSearch::new(EmbeddingSearch::new(Arc::new(FixedProvider)));
        strategy
            .initialize(&[tool("a__x", "search github issues", vec![1.0, 0.0])])
            .await
            .unwrap();
        let results = strategy.search("search github issues", 10, 0.0).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 1e-9);
        assert_eq!(results[0].match_type, MatchType::Hybrid);
    }

    #[tokio::test]
    async fn embedding_failure_aborts_hybrid_search() {
        let mut strategy = HybridSearch::new(EmbeddingSearch::new(Arc::new(FixedProvider)));
        let tool_without_embedding = IndexedTool {
            embedding: None,
            ..tool("a__x", "search github issues", vec![])
        };
        strategy.initialize(&[tool_without_embedding]).await.unwrap();
        let err = strategy.search("search github issues", 10, 0.0).await.unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::Corpus);
    }
}
