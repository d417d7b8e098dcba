// ABOUTME: BM25 (Okapi) lexical search strategy, k1=1.5 b=0.75

use std::collections::HashMap;

use async_trait::async_trait;

use crate::constants::{BM25_B, BM25_K1};
use crate::errors::AppResult;
use crate::index::builder::tokenize;
use crate::index::model::IndexedTool;

use super::{MatchType, SearchResult, SearchStrategy};

struct Document {
    name: String,
    title: Option<String>,
    description: String,
    term_frequency: HashMap<String, usize>,
    length: usize,
}

/// Okapi BM25 ranking over the corpus's tokenized searchable text.
#[derive(Default)]
pub struct Bm25Search {
    documents: Vec<Document>,
    document_frequency: HashMap<String, usize>,
    average_document_length: f64,
}

#[async_trait]
impl SearchStrategy for Bm25Search {
    async fn initialize(&mut self, tools: &[IndexedTool]) -> AppResult<()> {
        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        let mut documents = Vec::with_capacity(tools.len());
        let mut total_length = 0usize;

        for tool in tools {
            let tokens = tokenize(&tool.searchable_text);
            total_length += tokens.len();

            let mut term_frequency: HashMap<String, usize> = HashMap::new();
            for token in &tokens {
                *term_frequency.entry(token.clone()).or_insert(0) += 1;
            }
            for token in term_frequency.keys() {
                *document_frequency.entry(token.clone()).or_insert(0) += 1;
            }

            documents.push(Document {
                name: tool.name.clone(),
                title: tool.definition.title.clone(),
                description: tool.definition.description.clone().unwrap_or_default(),
                length: tokens.len(),
                term_frequency,
            });
        }

        self.average_document_length = if documents.is_empty() {
            0.0
        } else {
            total_length as f64 / documents.len() as f64
        };
        self.document_frequency = document_frequency;
        self.documents = documents;
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize, threshold: f64) -> AppResult<Vec<SearchResult>> {
        let query_terms = tokenize(query);
        let corpus_size = self.documents.len() as f64;

        let idf: HashMap<&str, f64> = query_terms
            .iter()
            .map(|term| {
                let df = *self.document_frequency.get(term).unwrap_or(&0) as f64;
                let value = ((corpus_size - df + 0.5) / (df + 0.5) + 1.0).ln();
                (term.as_str(), value)
            })
            .collect();

        let mut results: Vec<SearchResult> = self
            .documents
            .iter()
            .filter_map(|doc| {
                let score = self.score_document(doc, &query_terms, &idf);
                (score > 0.0).then(|| SearchResult {
                    name: doc.name.clone(),
                    title: doc.title.clone(),
                    description: doc.description.clone(),
                    score,
                    match_type: MatchType::Bm25,
                })
            })
            .collect();

        let max_score = results.iter().fold(0.0_f64, |max, r| max.max(r.score));
        if max_score > 0.0 {
            for result in &mut results {
                result.score /= max_score;
            }
        }
        results.retain(|r| r.score >= threshold);

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        Ok(results)
    }
}

impl Bm25Search {
    fn score_document(&self, doc: &Document, query_terms: &[String], idf: &HashMap<&str, f64>) -> f64 {
        let mut score = 0.0;
        for term in query_terms {
            let Some(&term_idf) = idf.get(term.as_str()) else {
                continue;
            };
            let term_frequency = *doc.term_frequency.get(term).unwrap_or(&0) as f64;
            if term_frequency == 0.0 {
                continue;
            }
            let length_norm = 1.0 - BM25_B + BM25_B * (doc.length as f64 / self.average_document_length.max(1.0));
            let numerator = term_frequency * (BM25_K1 + 1.0);
            let denominator = term_frequency + BM25_K1 * length_norm;
            score += term_idf * (numerator / denominator);
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, text: &str) -> IndexedTool {
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
            embedding: None,
        }
    }

    #[tokio::test]
    async fn ranks_exact_term_match_above_unrelated_document() {
        let mut strategy = Bm25Search::default();
        strategy
            .initialize(&[
                tool("a__x", "search github issues by label and milestone"),
                tool("a__y", "deploy a kubernetes cluster to production"),
            ])
            .await
            .unwrap();
        let results = strategy.search("github issues", 10, 0.0).await.unwrap();
        assert_eq!(results[0].name, "a__x");
    }

    #[tokio::test]
    async fn top_result_scores_one_after_normalization() {
        let mut strategy = Bm25Search::default();
        strategy
            .initialize(&[
                tool("a__x", "search github issues by label and milestone"),
                tool("a__y", "deploy a kubernetes cluster to production"),
            ])
            .await
            .unwrap();
        let results = strategy.search("github issues", 10, 0.0).await.unwrap();
        assert!((results[0].score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn no_query_term_overlap_yields_no_results() {
        let mut strategy = Bm25Search::default();
        strategy
            .initialize(&[tool("a__x", "search github issues")])
            .await
            .unwrap();
        let results = strategy.search("zzz nonexistent", 10, 0.0).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn empty_corpus_returns_empty_results() {
        let mut strategy = Bm25Search::default();
        strategy.initialize(&[]).await.unwrap();
        let results = strategy.search("anything", 10, 0.0).await.unwrap();
        assert!(results.is_empty());
    }
}
