// ABOUTME: Merges a user-scope and a project-scope index into one served corpus

use std::collections::HashMap;

use super::model::{Bm25Stats, IndexedTool};

/// Merge two tool lists by name, the second list's entries winning on
/// collision (project index overrides user index). Iteration order is
/// user-then-project: `base` entries first in their own order (using the
/// overlay's value where overridden), then any overlay-only entries in
/// overlay order.
#[must_use]
pub fn merge_indexed_tools(base: &[IndexedTool], overlay: &[IndexedTool]) -> Vec<IndexedTool> {
    let mut by_name: HashMap<&str, &IndexedTool> = HashMap::new();
    for tool in base {
        by_name.insert(&tool.name, tool);
    }
    for tool in overlay {
        by_name.insert(&tool.name, tool);
    }

    let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
    let mut merged = Vec::with_capacity(by_name.len());
    for tool in base.iter().chain(overlay.iter()) {
        if seen.insert(&tool.name) {
            merged.push(by_name[tool.name.as_str()].clone());
        }
    }
    merged
}

/// Combine two corpora's BM25 statistics: document counts sum, average
/// document length is weighted by document count, and document frequency
/// sums per token.
#[must_use]
pub fn merge_bm25_stats(base: &Bm25Stats, overlay: &Bm25Stats) -> Bm25Stats {
    let document_count = base.document_count + overlay.document_count;

    let average_document_length = if document_count == 0 {
        0.0
    } else {
        let weighted_total = base.average_document_length * base.document_count as f64
            + overlay.average_document_length * overlay.document_count as f64;
        weighted_total / document_count as f64
    };

    let mut document_frequency = base.document_frequency.clone();
    for (token, count) in &overlay.document_frequency {
        *document_frequency.entry(token.clone()).or_insert(0) += count;
    }

    Bm25Stats {
        document_count,
        average_document_length,
        document_frequency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str) -> IndexedTool {
        IndexedTool {
            name: name.to_owned(),
            original_name: name.to_owned(),
            server_name: "server".into(),
            definition: crate::index::model::ToolDefinition {
                name: name.to_owned(),
                title: None,
                description: None,
                input_schema: serde_json::Value::Null,
            },
            searchable_text: String::new(),
            embedding: None,
        }
    }

    #[test]
    fn overlay_wins_on_name_collision() {
        let mut user_tool = tool("shared__x");
        user_tool.original_name = "user-version".into();
        let mut project_tool = tool("shared__x");
        project_tool.original_name = "project-version".into();

        let merged = merge_indexed_tools(&[user_tool], &[project_tool]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].original_name, "project-version");
    }

    #[test]
    fn disjoint_tool_sets_both_survive() {
        let merged = merge_indexed_tools(&[tool("a__x")], &[tool("b__y")]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn iteration_order_is_user_then_project() {
        let merged = merge_indexed_tools(
            &[tool("user__a"), tool("user__b")],
            &[tool("proj__c"), tool("proj__d")],
        );
        let names: Vec<&str> = merged.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["user__a", "user__b", "proj__c", "proj__d"]);
    }

    #[test]
    fn bm25_stats_document_count_sums() {
        let base = Bm25Stats {
            document_count: 3,
            average_document_length: 10.0,
            document_frequency: [("foo".to_owned(), 2)].into_iter().collect(),
        };
        let overlay = Bm25Stats {
            document_count: 1,
            average_document_length: 30.0,
            document_frequency: [("foo".to_owned(), 1)].into_iter().collect(),
        };
        let merged = merge_bm25_stats(&base, &overlay);
        assert_eq!(merged.document_count, 4);
        assert_eq!(*merged.document_frequency.get("foo").unwrap(), 3);
        assert!((merged.average_document_length - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn merging_with_empty_overlay_is_identity() {
        let base = Bm25Stats {
            document_count: 2,
            average_document_length: 5.0,
            document_frequency: HashMap::new(),
        };
        let merged = merge_bm25_stats(&base, &Bm25Stats::empty());
        assert_eq!(merged.document_count, 2);
        assert!((merged.average_document_length - 5.0).abs() < f64::EPSILON);
    }
}
