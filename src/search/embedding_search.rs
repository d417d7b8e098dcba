// ABOUTME: Embedding search strategy: cosine similarity over pre-computed tool vectors

use std::sync::Arc;

use async_trait::async_trait;

use crate::embeddings::EmbeddingProvider;
use crate::errors::{AppError, AppResult};
use crate::index::model::IndexedTool;

use super::{MatchType, SearchResult, SearchStrategy};

struct Document {
    name: String,
    title: Option<String>,
    description: String,
    vector: Vec<f32>,
}

/// Ranks tools by cosine similarity between the query's embedding and each
/// tool's pre-computed vector. Requires an index built with embeddings.
pub struct EmbeddingSearch {
    provider: Arc<dyn EmbeddingProvider>,
    documents: Vec<Document>,
}

impl EmbeddingSearch {
    /// Build a strategy that will embed queries with `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            documents: Vec::new(),
        }
    }
}

#[async_trait]
impl SearchStrategy for EmbeddingSearch {
    async fn initialize(&mut self, tools: &[IndexedTool]) -> AppResult<()> {
        self.documents = tools
            .iter()
            .filter_map(|t| {
                t.embedding.clone().map(|vector| Document {
                    name: t.name.clone(),
                    title: t.definition.title.clone(),
                    description: t.definition.description.clone().unwrap_or_default(),
                    vector,
                })
            })
            .collect();
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize, threshold: f64) -> AppResult<Vec<SearchResult>> {
        if self.documents.is_empty() {
            return Err(AppError::corpus(
                "No tools with embeddings available for this index; rebuild with an embedding provider",
            ));
        }

        let query_vector = self.provider.embed(query).await?;

        let mut results: Vec<SearchResult> = self
            .documents
            .iter()
            .map(|doc| SearchResult {
                name: doc.name.clone(),
                title: doc.title.clone(),
                description: doc.description.clone(),
                score: cosine_similarity(&query_vector, &doc.vector),
                match_type: MatchType::Embedding,
            })
            .filter(|r| r.score >= threshold)
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        Ok(results)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let len = a.len().min(b.len());
    let dot: f64 = (0..len).map(|i| a[i] as f64 * b[i] as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::index::model::EmbeddingProviderTag;

    struct FixedProvider(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        fn tag(&self) -> EmbeddingProviderTag {
            EmbeddingProviderTag {
                location: "local".into(),
                model: "fixed".into(),
                dtype: None,
            }
        }
        fn dimension(&self) -> usize {
            self.0.len()
        }
        async fn initialize(&self) -> AppResult<()> {
            Ok(())
        }
        async fn embed_batch(&self, texts: &[&str]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }
    }

    fn tool_with_embedding(name: &str, vector: Vec<f32>) -> IndexedTool {
        IndexedTool {
            name: name.to_owned(),
            original_name: name.to_owned(),
            server_name: "server".into(),
            definition: crate::index::model::ToolDefinition {
                name: name.to_owned(),
                title: None,
                description: Some("d".into()),
                input_schema: serde_json::Value::Null,
            },
            searchable_text: "d".into(),
            embedding: Some(vector),
        }
    }

    #[test]
    fn identical_vectors_have_similarity_one() {
        let sim = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]);
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(sim.abs() < 1e-9);
    }

    #[tokio::test]
    async fn no_embeddings_is_a_corpus_error() {
        let mut strategy = EmbeddingSearch::new(Arc::new(FixedProvider(vec![1.0, 0.0])));
        let tool = crate::index::model::IndexedTool {
            embedding: None,
            ..tool_with_embedding("a__x", vec![])
        };
        strategy.initialize(&[tool]).await.unwrap();
        let err = strategy.search("anything", 10, 0.0).await.unwrap_err();
        assert!(err.message.contains("No tools with embeddings"));
    }

    #[tokio::test]
    async fn ranks_by_cosine_similarity() {
        let mut strategy = EmbeddingSearch::new(Arc::new(FixedProvider(vec![1.0, 0.0])));
        strategy
            .initialize(&[
                tool_with_embedding("a__match", vec![1.0, 0.0]),
                tool_with_embedding("a__other", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        let results = strategy.search("query", 10, 0.0).await.unwrap();
        assert_eq!(results[0].name, "a__match");
    }
}
