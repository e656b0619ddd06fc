//! Collection lifecycle: guarded indexing and tolerant clearing.
//!
//! A collection is populated at most once per chunk set. Two guard
//! policies are available:
//!
//! - [`IndexPolicy::Fingerprint`] (default) keys ingestion on a SHA-256
//!   over every chunk id and content. A matching fingerprint skips; a
//!   different chunk set replaces the collection contents.
//! - [`IndexPolicy::IfEmpty`] inserts only into an empty collection and
//!   skips otherwise, even if the stored entries came from other documents.
//!
//! Callers that share a store across tasks must serialize
//! `ensure_collection` + [`index_chunks`]; the pipeline holds a mutex
//! around the pair.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::RagError;
use crate::models::{Chunk, IndexedChunk};
use crate::store::{CollectionInfo, VectorStore};

/// Guard applied before inserting into a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexPolicy {
    #[default]
    Fingerprint,
    IfEmpty,
}

/// What the guard decided for a collection and chunk set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexDecision {
    Insert,
    Skip { existing: usize },
    Replace { previous: usize },
}

/// Result of [`index_chunks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexOutcome {
    Inserted { count: usize },
    Skipped { existing: usize },
    Replaced { previous: usize, count: usize },
}

impl IndexOutcome {
    /// Number of entries in the collection after the call.
    pub fn stored(&self) -> usize {
        match *self {
            IndexOutcome::Inserted { count } => count,
            IndexOutcome::Skipped { existing } => existing,
            IndexOutcome::Replaced { count, .. } => count,
        }
    }
}

/// SHA-256 over every chunk id and content, in order.
pub fn chunk_set_fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.id().as_bytes());
        hasher.update([0u8]);
        hasher.update(chunk.content.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Apply `policy` to the current state of a collection.
pub fn decide(info: &CollectionInfo, fingerprint: &str, policy: IndexPolicy) -> IndexDecision {
    if info.count == 0 {
        return IndexDecision::Insert;
    }
    match policy {
        IndexPolicy::IfEmpty => IndexDecision::Skip {
            existing: info.count,
        },
        IndexPolicy::Fingerprint if info.fingerprint.as_deref() == Some(fingerprint) => {
            IndexDecision::Skip {
                existing: info.count,
            }
        }
        IndexPolicy::Fingerprint => IndexDecision::Replace {
            previous: info.count,
        },
    }
}

/// Ensure `collection` exists and index `chunks` unless the guard skips.
///
/// `embeddings[i]` belongs to `chunks[i]`. A skip is a no-op that reports
/// the existing entry count.
pub async fn index_chunks(
    store: &dyn VectorStore,
    collection: &str,
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    policy: IndexPolicy,
) -> Result<IndexOutcome> {
    if chunks.len() != embeddings.len() {
        bail!(
            "got {} embeddings for {} chunks",
            embeddings.len(),
            chunks.len()
        );
    }

    let info = store.ensure_collection(collection).await?;
    let fingerprint = chunk_set_fingerprint(chunks);

    let previous = match decide(&info, &fingerprint, policy) {
        IndexDecision::Skip { existing } => {
            info!(collection, existing, "collection already indexed, skipping");
            return Ok(IndexOutcome::Skipped { existing });
        }
        IndexDecision::Replace { previous } => {
            store.reset(collection).await?;
            Some(previous)
        }
        IndexDecision::Insert => None,
    };

    let entries: Vec<IndexedChunk> = chunks
        .iter()
        .zip(embeddings.iter())
        .map(|(c, v)| IndexedChunk::new(c, v.clone()))
        .collect();
    store.add(collection, &entries).await?;
    store.set_fingerprint(collection, Some(&fingerprint)).await?;

    let count = entries.len();
    info!(collection, count, "stored chunks");

    Ok(match previous {
        Some(previous) => IndexOutcome::Replaced { previous, count },
        None => IndexOutcome::Inserted { count },
    })
}

/// Delete `collection`. Returns `false` when it did not exist.
///
/// Only a missing collection is tolerated; connectivity and other store
/// failures propagate.
pub async fn clear_collection(store: &dyn VectorStore, collection: &str) -> Result<bool> {
    match store.delete_collection(collection).await {
        Ok(()) => Ok(true),
        Err(e) if RagError::is_collection_not_found(&e) => Ok(false),
        Err(e) => Err(e),
    }
}
