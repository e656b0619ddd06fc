//! Retriever: nearest-neighbour search plus passage filtering.

use anyhow::Result;

use crate::models::RetrievedPassage;
use crate::store::{StoreHit, VectorStore};

/// Passages whose trimmed content is this long or shorter are dropped.
pub const DEFAULT_MIN_PASSAGE_CHARS: usize = 20;

/// Keep hits whose trimmed content is longer than `min_chars`, in order.
pub fn filter_passages(hits: Vec<StoreHit>, min_chars: usize) -> Vec<RetrievedPassage> {
    hits.into_iter()
        .filter(|h| h.content.trim().chars().count() > min_chars)
        .map(|h| RetrievedPassage {
            content: h.content,
            metadata: h.metadata,
            score: h.score,
        })
        .collect()
}

/// Search `collection` for the `top_k` nearest chunks and filter them.
///
/// No re-ranking is applied; the store's ordering is preserved. The result
/// may be shorter than `top_k`, or empty.
pub async fn retrieve(
    store: &dyn VectorStore,
    collection: &str,
    query_vec: &[f32],
    top_k: usize,
    min_chars: usize,
) -> Result<Vec<RetrievedPassage>> {
    let hits = store.query(collection, query_vec, top_k).await?;
    let found = hits.len();
    let passages = filter_passages(hits, min_chars);
    tracing::debug!(collection, found, kept = passages.len(), "retrieved passages");
    Ok(passages)
}
