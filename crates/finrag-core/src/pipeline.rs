//! Pipeline orchestrator.
//!
//! [`Pipeline::answer`] runs one question against one document set:
//!
//! ```text
//! documents ─▶ chunk ─▶ guard ─▶ embed chunks ─▶ index
//! query ─▶ embed ─▶ search + filter ─▶ prompt ─┬─▶ generate ─▶ answer
//!                                              └─▶ refusal
//! ```
//!
//! Empty input short-circuits with an explanatory answer. Embedding and
//! store failures propagate; generation failures become answer text.
//!
//! The collection is guarded by a read-write lock. Indexing and
//! [`Pipeline::clear`] take it exclusively; a query keeps it shared from the
//! moment its chunk set is indexed until retrieval returns, so another
//! request can neither replace nor drop the collection under it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, info};

use crate::chunk::{chunk_documents, ChunkOptions};
use crate::embedding::{embed_chunks, embed_query, Embedder};
use crate::generate::{generate_answer, Generation, GenerationParams, Generator};
use crate::index::{chunk_set_fingerprint, clear_collection, decide, index_chunks};
use crate::index::{IndexDecision, IndexOutcome, IndexPolicy};
use crate::models::RawDocument;
use crate::prompt::{assemble_prompt, Augmented};
use crate::retrieve::{retrieve, DEFAULT_MIN_PASSAGE_CHARS};
use crate::store::VectorStore;

/// Answer for an empty document set.
pub const NO_DOCUMENTS_ANSWER: &str = "No documents uploaded.";
/// Answer when every document normalized to nothing.
pub const NO_CHUNKS_ANSWER: &str = "No documents available.";

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "financial_documents";

/// Tunables for a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub collection: String,
    pub chunking: ChunkOptions,
    pub top_k: usize,
    pub min_passage_chars: usize,
    pub index_policy: IndexPolicy,
    pub embed_batch_size: usize,
    pub generation: GenerationParams,
    pub generation_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            chunking: ChunkOptions::default(),
            top_k: 3,
            min_passage_chars: DEFAULT_MIN_PASSAGE_CHARS,
            index_policy: IndexPolicy::default(),
            embed_batch_size: 64,
            generation: GenerationParams::default(),
            generation_timeout: Duration::from_secs(60),
        }
    }
}

/// How an [`Answer`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    NoDocuments,
    NoChunks,
    /// Retrieval found nothing usable; the generator was not called.
    Refused,
    Generated,
    GenerationFailed,
}

/// Final answer for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub outcome: Outcome,
    /// Indexing result, when the run got that far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexOutcome>,
}

impl Answer {
    fn short(text: &str, outcome: Outcome) -> Self {
        Self {
            text: text.to_string(),
            outcome,
            index: None,
        }
    }
}

/// Retrieval-augmented question answering over one collection.
///
/// Cheap to share behind an `Arc`; concurrent `answer` calls are safe,
/// including calls with different document sets and concurrent `clear`s.
pub struct Pipeline {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    store: Arc<dyn VectorStore>,
    options: PipelineOptions,
    collection_lock: RwLock<()>,
}

impl Pipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        store: Arc<dyn VectorStore>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            embedder,
            generator,
            store,
            options,
            collection_lock: RwLock::new(()),
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Answer `query` from `documents`.
    pub async fn answer(&self, documents: &[RawDocument], query: &str) -> Result<Answer> {
        if documents.is_empty() {
            info!("no documents supplied");
            return Ok(Answer::short(NO_DOCUMENTS_ANSWER, Outcome::NoDocuments));
        }

        let chunks = chunk_documents(documents, &self.options.chunking);
        debug!(documents = documents.len(), chunks = chunks.len(), "chunked documents");
        if chunks.is_empty() {
            info!("documents produced no chunks");
            return Ok(Answer::short(NO_CHUNKS_ANSWER, Outcome::NoChunks));
        }

        let query_vec = embed_query(self.embedder.as_ref(), query).await?;
        debug!(dims = query_vec.len(), "embedded query");

        let write_guard = self.collection_lock.write().await;
        let index = self.ensure_indexed(&write_guard, &chunks).await?;
        // Shared from here on: readers of the same chunk set proceed
        // together, a replace or clear waits until retrieval is done.
        let read_guard = write_guard.downgrade();

        let passages = retrieve(
            self.store.as_ref(),
            &self.options.collection,
            &query_vec,
            self.options.top_k,
            self.options.min_passage_chars,
        )
        .await?;
        drop(read_guard);

        let prompt = match assemble_prompt(query, &passages) {
            Augmented::Refusal(text) => {
                info!("no relevant passages, refusing");
                return Ok(Answer {
                    text,
                    outcome: Outcome::Refused,
                    index: Some(index),
                });
            }
            Augmented::Prompt(prompt) => prompt,
        };
        debug!(chars = prompt.len(), "assembled prompt");

        let generation = generate_answer(
            self.generator.as_ref(),
            &prompt,
            &self.options.generation,
            self.options.generation_timeout,
        )
        .await;

        let outcome = match generation {
            Generation::Completed(_) => Outcome::Generated,
            Generation::Failed(_) => Outcome::GenerationFailed,
        };
        Ok(Answer {
            text: generation.into_text(),
            outcome,
            index: Some(index),
        })
    }

    /// Index `chunks` unless the collection already holds them.
    ///
    /// Requires the exclusive collection guard. Chunk embeddings are
    /// computed only when the guard lets the insert through.
    async fn ensure_indexed(
        &self,
        _exclusive: &RwLockWriteGuard<'_, ()>,
        chunks: &[crate::models::Chunk],
    ) -> Result<IndexOutcome> {
        let collection = &self.options.collection;

        let info = self.store.ensure_collection(collection).await?;
        let fingerprint = chunk_set_fingerprint(chunks);
        if let IndexDecision::Skip { existing } =
            decide(&info, &fingerprint, self.options.index_policy)
        {
            debug!(collection = %collection, existing, "index up to date");
            return Ok(IndexOutcome::Skipped { existing });
        }

        let vectors = embed_chunks(
            self.embedder.as_ref(),
            chunks,
            self.options.embed_batch_size,
        )
        .await?;
        index_chunks(
            self.store.as_ref(),
            collection,
            chunks,
            &vectors,
            self.options.index_policy,
        )
        .await
    }

    /// Delete the collection. Returns `false` if it did not exist.
    ///
    /// Waits for in-flight retrievals to finish first.
    pub async fn clear(&self) -> Result<bool> {
        let _guard = self.collection_lock.write().await;
        let removed = clear_collection(self.store.as_ref(), &self.options.collection).await?;
        info!(collection = %self.options.collection, removed, "cleared collection");
        Ok(removed)
    }

    /// Number of entries in the collection, or 0 if it does not exist.
    pub async fn indexed_count(&self) -> Result<usize> {
        match self.store.count(&self.options.collection).await {
            Ok(n) => Ok(n),
            Err(e) if crate::error::RagError::is_collection_not_found(&e) => Ok(0),
            Err(e) => Err(e),
        }
    }
}
