// ABOUTME: Index Builder: flattens tool definitions into searchable text, tokenizes, and computes BM25 stats
// ABOUTME: Batches embedding requests

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use rmcp::model::Tool;
use tracing::info;

use crate::constants::{EMBEDDING_BATCH_SIZE, MIN_TOKEN_LEN, STOP_WORDS};
use crate::embeddings::EmbeddingProvider;
use crate::errors::AppResult;
use crate::transport::client::adorn_with_provenance;

use super::model::{Bm25Stats, IndexedTool, ToolDefinition};

/// Reports embedding batch progress during a build: `(completed, total)`.
pub type EmbeddingProgress = Arc<dyn Fn(usize, usize) + Send + Sync>;

fn separator_chars() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[_\-./\s]+").unwrap())
}

fn word_chars() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]+").unwrap())
}

/// Flatten a tool's name, title, description, and input schema keys into one
/// blob of searchable text, splitting `camelCase`/`snake_case`/`kebab-case`
/// identifiers into their component words.
#[must_use]
pub fn build_searchable_text(definition: &ToolDefinition) -> String {
    let mut parts = vec![split_identifier(&definition.name)];
    if let Some(title) = &definition.title {
        parts.push(split_identifier(title));
    }
    if let Some(description) = &definition.description {
        parts.push(description.clone());
    }
    collect_schema_keys(&definition.input_schema, &mut parts);
    parts.join(" ")
}

/// Split `_`/`-`/`.`/whitespace-delimited identifiers into words, and further
/// split `camelCase` runs at each lowercase-to-uppercase transition.
fn split_identifier(s: &str) -> String {
    let on_separators = separator_chars().replace_all(s, " ");
    let mut words = Vec::new();
    for chunk in on_separators.split(' ').filter(|c| !c.is_empty()) {
        words.push(split_camel_case(chunk));
    }
    words.join(" ")
}

fn split_camel_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len() + 4);
    let mut prev_lower_or_digit = false;
    for ch in word.chars() {
        if ch.is_uppercase() && prev_lower_or_digit {
            out.push(' ');
        }
        prev_lower_or_digit = ch.is_lowercase() || ch.is_ascii_digit();
        out.push(ch);
    }
    out
}

fn collect_schema_keys(value: &serde_json::Value, parts: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, nested) in map {
                if key == "properties" {
                    if let serde_json::Value::Object(props) = nested {
                        for prop_name in props.keys() {
                            parts.push(split_identifier(prop_name));
                        }
                    }
                }
                collect_schema_keys(nested, parts);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_schema_keys(item, parts);
            }
        }
        _ => {}
    }
}

/// Lowercase, split on non-alphanumerics, drop stop words and tokens shorter
/// than `MIN_TOKEN_LEN`.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    word_chars()
        .split(&text.to_lowercase())
        .filter(|t| t.len() >= MIN_TOKEN_LEN && !STOP_WORDS.contains(t))
        .map(str::to_owned)
        .collect()
}

/// Build `IndexedTool` entries from one upstream's raw tool list, adorning
/// names with provenance and computing searchable text (no embeddings yet).
#[must_use]
pub fn index_tools_from_upstream(server_name: &str, tools: Vec<Tool>) -> Vec<IndexedTool> {
    tools
        .into_iter()
        .map(|tool| {
            let definition = ToolDefinition {
                name: tool.name.to_string(),
                title: tool
                    .annotations
                    .as_ref()
                    .and_then(|a| a.title.clone()),
                description: tool.description.as_ref().map(|d| d.to_string()),
                input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
            };
            let searchable_text = build_searchable_text(&definition);
            IndexedTool {
                name: adorn_with_provenance(server_name, &definition.name),
                original_name: definition.name.clone(),
                server_name: server_name.to_owned(),
                definition,
                searchable_text,
                embedding: None,
            }
        })
        .collect()
}

/// Compute BM25 corpus statistics over a set of indexed tools.
#[must_use]
pub fn compute_bm25_stats(tools: &[IndexedTool]) -> Bm25Stats {
    if tools.is_empty() {
        return Bm25Stats::empty();
    }

    let mut document_frequency: HashMap<String, usize> = HashMap::new();
    let mut total_length = 0usize;

    for tool in tools {
        let tokens = tokenize(&tool.searchable_text);
        total_length += tokens.len();
        let unique: std::collections::HashSet<_> = tokens.into_iter().collect();
        for token in unique {
            *document_frequency.entry(token).or_insert(0) += 1;
        }
    }

    Bm25Stats {
        document_count: tools.len(),
        average_document_length: total_length as f64 / tools.len() as f64,
        document_frequency,
    }
}

/// Embed every tool's searchable text in batches of `EMBEDDING_BATCH_SIZE`,
/// writing the resulting vector back into each tool.
///
/// # Errors
///
/// Returns whatever error the embedding provider returns; partially embedded
/// tools from a failed batch are left with `embedding: None`.
pub async fn embed_tools(
    tools: &mut [IndexedTool],
    provider: &dyn EmbeddingProvider,
    progress: Option<EmbeddingProgress>,
) -> AppResult<()> {
    let total = tools.len();
    let mut completed = 0usize;

    for batch in tools.chunks_mut(EMBEDDING_BATCH_SIZE) {
        let texts: Vec<&str> = batch.iter().map(|t| t.searchable_text.as_str()).collect();
        let vectors = provider.embed_batch(&texts).await?;
        for (tool, vector) in batch.iter_mut().zip(vectors) {
            tool.embedding = Some(vector);
        }
        completed += batch.len();
        if let Some(cb) = &progress {
            cb(completed, total);
        }
    }

    info!(total, "embedding build complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(name: &str, description: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_owned(),
            title: None,
            description: Some(description.to_owned()),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": { "repoName": {}, "issue_id": {} }
            }),
        }
    }

    #[test]
    fn splits_camel_case_identifiers() {
        assert_eq!(split_identifier("searchIssues"), "search Issues");
    }

    #[test]
    fn splits_snake_and_kebab_case() {
        assert_eq!(split_identifier("search_issues"), "search issues");
        assert_eq!(split_identifier("search-issues"), "search issues");
    }

    #[test]
    fn searchable_text_includes_schema_property_names() {
        let def = definition("searchIssues", "Search GitHub issues by query");
        let text = build_searchable_text(&def);
        assert!(text.contains("repo Name"));
        assert!(text.contains("issue id"));
    }

    #[test]
    fn tokenize_drops_stop_words_and_short_tokens() {
        let tokens = tokenize("the quick fox is a dog");
        assert!(!tokens.contains(&"the".to_owned()));
        assert!(!tokens.contains(&"is".to_owned()));
        assert!(!tokens.contains(&"a".to_owned()));
        assert!(tokens.contains(&"quick".to_owned()));
        assert!(tokens.contains(&"fox".to_owned()));
        assert!(tokens.contains(&"dog".to_owned()));
    }

    #[test]
    fn bm25_stats_on_empty_corpus() {
        let stats = compute_bm25_stats(&[]);
        assert_eq!(stats.document_count, 0);
        assert_eq!(stats.average_document_length, 0.0);
    }

    #[test]
    fn bm25_stats_counts_document_frequency_not_term_frequency() {
        let tools = vec![
            IndexedTool {
                name: "a__x".into(),
                original_name: "x".into(),
                server_name: "a".into(),
                definition: definition("x", "search search search"),
                searchable_text: "search search search".into(),
                embedding: None,
            },
            IndexedTool {
                name: "a__y".into(),
                original_name: "y".into(),
                server_name: "a".into(),
                definition: definition("y", "search once"),
                searchable_text: "search once".into(),
                embedding: None,
            },
        ];
        let stats = compute_bm25_stats(&tools);
        assert_eq!(stats.document_count, 2);
        assert_eq!(*stats.document_frequency.get("search").unwrap(), 2);
    }
}
