//! In-memory [`VectorStore`] implementation.
//!
//! Collections live in a `HashMap` behind `std::sync::RwLock`. Search is
//! brute-force cosine similarity over every entry in the collection. State
//! lasts as long as the store value, which makes it a session-scoped store
//! when held by the process runtime.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::RagError;
use crate::models::IndexedChunk;

use super::{CollectionInfo, Distance, StoreHit, VectorStore};

struct Collection {
    distance: Distance,
    fingerprint: Option<String>,
    entries: Vec<IndexedChunk>,
}

/// In-memory vector store for tests and single-process sessions.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(name: &str) -> anyhow::Error {
    RagError::CollectionNotFound(name.to_string()).into()
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collection(&self, name: &str) -> Result<CollectionInfo> {
        let mut collections = self.write()?;
        let created = !collections.contains_key(name);
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Collection {
                distance: Distance::Cosine,
                fingerprint: None,
                entries: Vec::new(),
            });

        Ok(CollectionInfo {
            name: name.to_string(),
            distance: collection.distance,
            count: collection.entries.len(),
            fingerprint: collection.fingerprint.clone(),
            created,
        })
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.read()?;
        collections
            .get(collection)
            .map(|c| c.entries.len())
            .ok_or_else(|| not_found(collection))
    }

    async fn add(&self, collection: &str, entries: &[IndexedChunk]) -> Result<()> {
        let mut collections = self.write()?;
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection))?;

        for entry in entries {
            match stored.entries.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry.clone(),
                None => stored.entries.push(entry.clone()),
            }
        }
        Ok(())
    }

    async fn reset(&self, collection: &str) -> Result<()> {
        let mut collections = self.write()?;
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection))?;
        stored.entries.clear();
        stored.fingerprint = None;
        Ok(())
    }

    async fn set_fingerprint(&self, collection: &str, fingerprint: Option<&str>) -> Result<()> {
        let mut collections = self.write()?;
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection))?;
        stored.fingerprint = fingerprint.map(str::to_string);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query_vec: &[f32],
        top_k: usize,
    ) -> Result<Vec<StoreHit>> {
        let collections = self.read()?;
        let stored = collections
            .get(collection)
            .ok_or_else(|| not_found(collection))?;

        let mut hits: Vec<StoreHit> = stored
            .entries
            .iter()
            .map(|e| StoreHit {
                id: e.id.clone(),
                content: e.content.clone(),
                metadata: e.metadata.clone(),
                score: cosine_similarity(query_vec, &e.embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.write()?;
        collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }
}
