// ABOUTME: Regex search strategy: compiles the query as a pattern, falling back to an escaped literal

use async_trait::async_trait;
use regex::RegexBuilder;

use crate::errors::AppResult;
use crate::index::model::IndexedTool;

use super::{MatchType, SearchResult, SearchStrategy};

#[derive(Debug, Clone)]
struct Document {
    name: String,
    title: Option<String>,
    description: String,
    searchable_text: String,
}

/// Matches tools whose searchable text matches the query as a
/// case-insensitive regular expression. An invalid pattern falls back to
/// matching the query as an escaped literal substring.
#[derive(Default)]
pub struct RegexSearch {
    documents: Vec<Document>,
}

#[async_trait]
impl SearchStrategy for RegexSearch {
    async fn initialize(&mut self, tools: &[IndexedTool]) -> AppResult<()> {
        self.documents = tools
            .iter()
            .map(|t| Document {
                name: t.name.clone(),
                title: t.definition.title.clone(),
                description: t.definition.description.clone().unwrap_or_default(),
                searchable_text: t.searchable_text.clone(),
            })
            .collect();
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize, threshold: f64) -> AppResult<Vec<SearchResult>> {
        let pattern = RegexBuilder::new(query)
            .case_insensitive(true)
            .build()
            .unwrap_or_else(|_| {
                RegexBuilder::new(&regex::escape(query))
                    .case_insensitive(true)
                    .build()
                    .expect("escaped literal is always a valid pattern")
            });

        let query_lower = query.to_lowercase();

        let mut results: Vec<SearchResult> = self
            .documents
            .iter()
            .filter_map(|doc| score_document(&pattern, &doc.searchable_text, &query_lower).map(|score| SearchResult {
                name: doc.name.clone(),
                title: doc.title.clone(),
                description: doc.description.clone(),
                score,
                match_type: MatchType::Regex,
            }))
            .filter(|r| r.score >= threshold)
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        Ok(results)
    }
}

/// Composite score for one document's matches: `min(1, 2·density + 0.1·matchCount +
/// 0.2·positionBonus + exactMatchBonus)`, rounded to three decimals. Returns
/// `None` when the pattern doesn't match at all.
fn score_document(pattern: &regex::Regex, text: &str, query_lower: &str) -> Option<f64> {
    let text_len = text.len();
    if text_len == 0 {
        return None;
    }

    let mut match_count = 0usize;
    let mut matched_chars = 0usize;
    let mut first_start = None;
    let mut exact_match = false;

    for m in pattern.find_iter(text) {
        match_count += 1;
        matched_chars += m.len();
        if first_start.is_none() {
            first_start = Some(m.start());
        }
        if m.as_str().to_lowercase() == query_lower {
            exact_match = true;
        }
    }

    let first_start = first_start?;

    let density = matched_chars as f64 / text_len as f64;
    let position_bonus = 1.0 - (first_start as f64 / text_len as f64);
    let exact_match_bonus = if exact_match { 0.3 } else { 0.0 };

    let raw = 2.0 * density + 0.1 * match_count as f64 + 0.2 * position_bonus + exact_match_bonus;
    let score = raw.min(1.0);
    Some((score * 1000.0).round() / 1000.0)
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
    async fn matches_a_valid_pattern() {
        let mut strategy = RegexSearch::default();
        strategy
            .initialize(&[tool("a__x", "search github issues"), tool("a__y", "list files")])
            .await
            .unwrap();
        let results = strategy.search(r"^search", 10, 0.0).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "a__x");
    }

    #[tokio::test]
    async fn invalid_pattern_falls_back_to_literal_match() {
        let mut strategy = RegexSearch::default();
        strategy
            .initialize(&[tool("a__x", "search (unbalanced paren) issues")])
            .await
            .unwrap();
        let results = strategy.search("(unbalanced", 10, 0.0).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn exact_match_scores_higher_than_partial_match() {
        let mut strategy = RegexSearch::default();
        strategy
            .initialize(&[
                tool("a__exact", "search"),
                tool("a__partial", "search through a much longer document body"),
            ])
            .await
            .unwrap();
        let results = strategy.search("search", 10, 0.0).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "a__exact");
        assert!(results[0].score > results[1].score);
        assert!(results[0].score <= 1.0);
    }

    #[tokio::test]
    async fn respects_top_k() {
        let mut strategy = RegexSearch::default();
        strategy
            .initialize(&[tool("a__x", "match"), tool("a__y", "match"), tool("a__z", "match")])
            .await
            .unwrap();
        let results = strategy.search("match", 2, 0.0).await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
