//! Flat wire format for element snapshots.
//!
//! Elements and text nodes are listed in document (pre-order) order, each
//! pointing at its parent by index. Keeping the list flat means neither the
//! page-side script nor the JSON decoder nests once per DOM level.

use crate::dom::element::{ElementNode, NodeContent};
use crate::error::{Result, ScrapeError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One node of a flattened snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SnapshotEntry {
    /// An element; `parent` is `None` for the root of each matched subtree
    Element {
        parent: Option<usize>,
        tag_name: String,
        #[serde(default)]
        attributes: HashMap<String, String>,
    },
    /// A text node of the element at `parent`
    Text { parent: usize, text: String },
}

impl SnapshotEntry {
    pub fn parent(&self) -> Option<usize> {
        match self {
            SnapshotEntry::Element { parent, .. } => *parent,
            SnapshotEntry::Text { parent, .. } => Some(*parent),
        }
    }
}

/// Assemble element trees from a flat snapshot, one tree per root entry.
///
/// Every parent index must point at an earlier element entry.
pub fn build_forest(entries: Vec<SnapshotEntry>) -> Result<Vec<Arc<ElementNode>>> {
    let mut is_element: Vec<bool> = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        if let Some(parent) = entry.parent() {
            if parent >= index || !is_element[parent] {
                return Err(ScrapeError::DomParseFailed(format!(
                    "snapshot entry {} refers to invalid parent {}",
                    index, parent
                )));
            }
        }
        is_element.push(matches!(entry, SnapshotEntry::Element { .. }));
    }

    // Walking backwards, every child is finished before its parent is created
    let mut pending: Vec<Vec<NodeContent>> = entries.iter().map(|_| Vec::new()).collect();
    let mut roots = Vec::new();

    for (index, entry) in entries.into_iter().enumerate().rev() {
        match entry {
            SnapshotEntry::Text { parent, text } => pending[parent].push(NodeContent::Text(text)),
            SnapshotEntry::Element {
                parent,
                tag_name,
                attributes,
            } => {
                let mut content = std::mem::take(&mut pending[index]);
                content.reverse();
                let node = ElementNode::with_content(&tag_name, attributes, content);

                match parent {
                    Some(parent) => pending[parent].push(NodeContent::Element(node)),
                    None => roots.push(node),
                }
            }
        }
    }

    roots.reverse();
    Ok(roots)
}
