//! DOM snapshot and selector module
//!
//! This module provides the read-only element tree the matcher works on. It includes:
//! - ElementNode: an element with owned children and a weak parent link
//! - ElementSpec: hand-written subtree description used to build ElementNode trees
//! - SnapshotEntry: flat wire format pages are serialized into
//! - CssSelector: selector synthesized from an element's ancestor chain

pub mod element;
pub mod selector;
pub mod snapshot;

pub use element::{ContentSpec, ElementNode, ElementSpec};
pub use selector::{CssSelector, synthesize};
pub use snapshot::{SnapshotEntry, build_forest};

use crate::error::{Result, ScrapeError};
use std::sync::Arc;

/// Script evaluated in the page to serialize matched elements with their text nodes
const SNAPSHOT_JS: &str = include_str!("snapshot.js");

/// Build the snapshot expression for `selector`.
///
/// With `all` set every match is serialized in document order, otherwise only the first.
pub fn snapshot_script(selector: &str, all: bool) -> Result<String> {
    let selector_literal = serde_json::to_string(selector)
        .map_err(|e| ScrapeError::InvalidSelector(format!("{}: {}", selector, e)))?;
    Ok(format!("{}({}, {})", SNAPSHOT_JS.trim_end(), selector_literal, all))
}

/// Parse the JSON string produced by the snapshot script into element trees
pub fn parse_snapshot(json_str: &str) -> Result<Vec<Arc<ElementNode>>> {
    let entries: Vec<SnapshotEntry> = serde_json::from_str(json_str)
        .map_err(|e| ScrapeError::DomParseFailed(format!("Failed to parse DOM JSON: {}", e)))?;

    build_forest(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_script_quotes_selector() {
        let script = snapshot_script(r#"div[data-x="1"] p"#, true).unwrap();
        assert!(script.starts_with("(function"));
        assert!(script.ends_with(r#"("div[data-x=\"1\"] p", true)"#));
    }

    #[test]
    fn test_parse_snapshot() {
        let json = r#"[
            {"parent": null, "tag_name": "P", "attributes": {"class": "item"}},
            {"parent": 0, "text": "Alpha widget, $10"},
            {"parent": null, "tag_name": "p"},
            {"parent": 2, "text": "Beta widget, $20"}
        ]"#;

        let nodes = parse_snapshot(json).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].tag_name, "p");
        assert_eq!(nodes[0].get_attribute("class").map(String::as_str), Some("item"));
        assert_eq!(nodes[1].flattened_text(), "Beta widget, $20");
    }

    #[test]
    fn test_parse_deeply_nested_snapshot() {
        let depth = 5_000;
        let mut entries: Vec<_> = (0..depth)
            .map(|level| {
                let parent = if level == 0 { None } else { Some(level - 1) };
                serde_json::json!({"parent": parent, "tag_name": "div"})
            })
            .collect();
        entries.push(serde_json::json!({"parent": depth - 1, "text": "deep"}));
        let json = serde_json::Value::Array(entries).to_string();

        let nodes = parse_snapshot(&json).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].count_elements(), depth);
        assert_eq!(nodes[0].flattened_text(), "deep");
    }

    #[test]
    fn test_parse_snapshot_rejects_garbage() {
        let err = parse_snapshot("{not json").unwrap_err();
        assert!(matches!(err, ScrapeError::DomParseFailed(_)));
    }
}
