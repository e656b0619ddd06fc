//! Vector store abstraction.
//!
//! The [`VectorStore`] trait defines the collection-level operations the
//! pipeline needs: get-or-create a collection, add indexed chunks, count,
//! nearest-neighbour query, and drop. Backends are pluggable (in-memory
//! here, SQLite in the app crate).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Collection lifecycle policy (the "index at most once" guard and the
//! tolerant clear) lives in [`crate::index`], on top of this trait.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{ChunkMetadata, IndexedChunk};

/// Distance function a collection is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    Cosine,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "cosine",
        }
    }
}

/// Snapshot of a collection returned by [`VectorStore::ensure_collection`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub distance: Distance,
    /// Number of stored entries.
    pub count: usize,
    /// Fingerprint of the chunk set last indexed into the collection.
    pub fingerprint: Option<String>,
    /// True when this call created the collection.
    pub created: bool,
}

/// One nearest-neighbour match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreHit {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

/// Abstract vector store backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_collection`](VectorStore::ensure_collection) | Get or create a cosine collection |
/// | [`count`](VectorStore::count) | Number of entries in a collection |
/// | [`add`](VectorStore::add) | Insert entries (same id replaces) |
/// | [`reset`](VectorStore::reset) | Remove all entries, keep the collection |
/// | [`set_fingerprint`](VectorStore::set_fingerprint) | Record the indexed chunk-set fingerprint |
/// | [`query`](VectorStore::query) | Top-k cosine similarity search |
/// | [`delete_collection`](VectorStore::delete_collection) | Drop a collection |
///
/// Operations on a missing collection (other than `ensure_collection`)
/// fail with [`RagError::CollectionNotFound`](crate::error::RagError::CollectionNotFound).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return the collection, creating it (cosine distance) if absent.
    ///
    /// Must not fail merely because the collection already exists.
    async fn ensure_collection(&self, name: &str) -> Result<CollectionInfo>;

    async fn count(&self, collection: &str) -> Result<usize>;

    /// Insert entries. An entry whose id is already stored replaces it.
    async fn add(&self, collection: &str, entries: &[IndexedChunk]) -> Result<()>;

    async fn reset(&self, collection: &str) -> Result<()>;

    async fn set_fingerprint(&self, collection: &str, fingerprint: Option<&str>) -> Result<()>;

    /// Return up to `top_k` entries ranked by descending cosine similarity.
    ///
    /// Ties keep the store's native order.
    async fn query(&self, collection: &str, query_vec: &[f32], top_k: usize)
        -> Result<Vec<StoreHit>>;

    async fn delete_collection(&self, name: &str) -> Result<()>;
}
