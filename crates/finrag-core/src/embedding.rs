//! Embedding trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that every embedding backend implements,
//! query preparation, batched chunk embedding, and pure helpers for vector
//! serialization and similarity.
//!
//! Network and model-backed embedders (fastembed, OpenAI, Ollama) live in
//! the `finrag` app crate. [`HashEmbedder`] is a deterministic,
//! dependency-free embedder for offline use and tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::RagError;
use crate::models::Chunk;

/// A text embedding backend.
///
/// Implementations must be deterministic: the same model and the same
/// input text yield the same vector. Backends that cannot load or reach
/// their model fail with [`RagError::ModelUnavailable`].
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Lower-case and trim a query before embedding.
///
/// Chunks are embedded as stored, but queries arrive with arbitrary casing
/// and stray whitespace that only add noise in embedding space.
pub fn prepare_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Prepare and embed a single query.
pub async fn embed_query(embedder: &dyn Embedder, query: &str) -> Result<Vec<f32>> {
    let prepared = prepare_query(query);
    let mut vectors = embedder.embed(&[prepared]).await?;
    match vectors.pop() {
        Some(v) if vectors.is_empty() => check_dims(embedder, v),
        _ => bail!("embedder returned an unexpected number of vectors for one query"),
    }
}

/// Embed chunk contents in batches of `batch_size`, preserving order.
pub async fn embed_chunks(
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let embedded = embedder.embed(&texts).await?;
        if embedded.len() != texts.len() {
            bail!(
                "embedder returned {} vectors for {} texts",
                embedded.len(),
                texts.len()
            );
        }
        for v in embedded {
            vectors.push(check_dims(embedder, v)?);
        }
    }

    Ok(vectors)
}

fn check_dims(embedder: &dyn Embedder, v: Vec<f32>) -> Result<Vec<f32>> {
    let expected = embedder.dims();
    if expected != 0 && v.len() != expected {
        return Err(RagError::DimensionMismatch {
            expected,
            actual: v.len(),
        }
        .into());
    }
    Ok(v)
}

/// Deterministic feature-hashing embedder.
///
/// Lower-cases the text, splits it into alphanumeric tokens (keeping `%`,
/// `$` and `.` inside tokens so figures like `10%` survive), and hashes
/// every unigram and adjacent bigram into a signed bucket. The result is
/// L2-normalized, so cosine similarity reflects shared vocabulary.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    /// Embed one text synchronously.
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !(c.is_alphanumeric() || matches!(c, '%' | '$' | '.')))
            .map(|t| t.trim_matches('.'))
            .filter(|t| !t.is_empty())
            .collect();

        for token in &tokens {
            self.accumulate(&mut v, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut v, bigram.as_bytes(), 0.5);
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    fn accumulate(&self, v: &mut [f32], feature: &[u8], weight: f32) {
        let digest = Sha256::digest(feature);
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        v[index] += sign * weight;
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Encode a float vector as little-endian `f32` bytes.
///
/// ```rust
/// use finrag_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, zero vectors, or vectors of different
/// lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMetadata, RawDocument};

    #[test]
    fn test_prepare_query() {
        assert_eq!(prepare_query("  What was Q1 REVENUE?\n"), "what was q1 revenue?");
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_hash_embedder_deterministic() {
        let e = HashEmbedder::new(64);
        assert_eq!(e.embed_one("Revenue grew 10%"), e.embed_one("Revenue grew 10%"));
        assert_eq!(e.embed_one("anything").len(), 64);
    }

    #[test]
    fn test_hash_embedder_prefers_shared_vocabulary() {
        let e = HashEmbedder::new(256);
        let q = e.embed_one("what was the q1 revenue growth");
        let near = e.embed_one("Revenue grew 10% in Q1. Revenue growth was strong.");
        let far = e.embed_one("The board appointed a new auditor for the pension plan.");
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[test]
    fn test_hash_embedder_empty_text_is_zero() {
        let v = HashEmbedder::new(8).embed_one("   ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_embed_query_normalizes_case() {
        let e = HashEmbedder::new(32);
        let a = embed_query(&e, "  Net Income ").await.unwrap();
        let b = embed_query(&e, "net income").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_embed_chunks_batches_in_order() {
        let e = HashEmbedder::new(16);
        let meta = ChunkMetadata::from(&RawDocument::uploaded("t", ""));
        let chunks: Vec<Chunk> = (0..5)
            .map(|i| Chunk {
                document_index: 0,
                chunk_index: i,
                content: format!("chunk number {}", i),
                metadata: meta.clone(),
            })
            .collect();
        let vectors = embed_chunks(&e, &chunks, 2).await.unwrap();
        assert_eq!(vectors.len(), 5);
        assert_eq!(vectors[3], e.embed_one("chunk number 3"));
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let err = embed_query(&ShortEmbedder, "q").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::DimensionMismatch {
                expected: 4,
                actual: 2
            })
        ));
    }
}
