//! Scoring DOM nodes against a query and picking the best one.

use crate::dom::ElementNode;
use crate::error::{Result, ScrapeError};
use crate::semantic::{Embedding, SemanticEngine};
use indexmap::IndexSet;
use std::sync::Arc;

/// Additive bonus for tags that usually wrap meaningful content
pub const TAG_BONUS: f64 = 0.1;

/// Tags receiving [`TAG_BONUS`]
pub const BONUS_TAGS: [&str; 2] = ["div", "a"];

/// Best-scoring element of a traversal
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub element: Arc<ElementNode>,
    pub score: f64,
    /// Number of nodes scored
    pub visited: usize,
}

/// Similarity between an element's text embedding and the query, plus the tag bonus
pub fn score_element(
    engine: &dyn SemanticEngine,
    element: &ElementNode,
    embedding: &Embedding,
    query: &Embedding,
) -> f64 {
    let score = engine.similarity(embedding, query);

    if BONUS_TAGS.iter().any(|tag| element.is_tag(tag)) {
        score + TAG_BONUS
    } else {
        score
    }
}

/// Score every node under `root` in pre-order and return the highest.
///
/// Distinct non-blank texts are embedded in a single batch; blank nodes only
/// score their tag bonus. Only a strictly greater score replaces the current
/// best, so the first node in pre-order wins ties. There is no pruning.
pub async fn find_best_match(
    engine: &dyn SemanticEngine,
    root: &Arc<ElementNode>,
    query: &Embedding,
) -> Result<MatchResult> {
    let mut nodes = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        nodes.push((node, node.flattened_text()));
        // Reversed so the first child is popped next
        stack.extend(node.children().rev());
    }

    let unique: IndexSet<&str> = nodes
        .iter()
        .map(|(_, text)| text.as_str())
        .filter(|text| !text.trim().is_empty())
        .collect();
    let batch: Vec<&str> = unique.iter().copied().collect();

    let embeddings = if batch.is_empty() {
        Vec::new()
    } else {
        engine.embed_batch(&batch).await?
    };
    if embeddings.len() != batch.len() {
        return Err(ScrapeError::Embedding(format!(
            "expected {} embeddings, got {}",
            batch.len(),
            embeddings.len()
        )));
    }

    let blank = Embedding::new(Vec::new());
    let mut best: Option<(&Arc<ElementNode>, f64)> = None;

    for (node, text) in &nodes {
        let embedding = unique.get_index_of(text.as_str()).map_or(&blank, |i| &embeddings[i]);
        let score = score_element(engine, node, embedding, query);

        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((*node, score));
        }
    }

    let visited = nodes.len();
    let (element, score) = best.unwrap_or((root, 0.0));
    Ok(MatchResult {
        element: element.clone(),
        score,
        visited,
    })
}
