//! Process-wide pipeline resources.
//!
//! Embedding and generation models and the vector store are expensive to
//! construct, so they are built once on first use and shared by every
//! caller in the process. [`shutdown`] drops them; the next call to
//! [`pipeline`] rebuilds from the config it is given.

use anyhow::{bail, Result};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Mutex;

use finrag_core::pipeline::{Pipeline, PipelineOptions};
use finrag_core::store::memory::InMemoryStore;
use finrag_core::store::VectorStore;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::{create_generator, params_from_config};
use crate::sqlite_store::SqliteStore;

fn slot() -> &'static Mutex<Option<Arc<Pipeline>>> {
    static SLOT: OnceLock<Mutex<Option<Arc<Pipeline>>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

/// The shared pipeline, built from `config` on first use.
///
/// Later calls return the existing pipeline; their `config` is ignored
/// until [`shutdown`] runs.
pub async fn pipeline(config: &Config) -> Result<Arc<Pipeline>> {
    let mut slot = slot().lock().await;
    if let Some(existing) = slot.as_ref() {
        return Ok(existing.clone());
    }

    let built = Arc::new(build_pipeline(config).await?);
    *slot = Some(built.clone());
    Ok(built)
}

/// Drop the shared pipeline and the models and store it holds.
pub async fn shutdown() {
    if slot().lock().await.take().is_some() {
        tracing::debug!("released shared pipeline resources");
    }
}

/// Build a fresh, unshared pipeline from `config`.
pub async fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let store = open_store(config).await?;
    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generation)?;

    tracing::debug!(
        backend = %config.store.backend,
        embedder = embedder.model_name(),
        generator = generator.model_name(),
        "built pipeline"
    );

    Ok(Pipeline::new(
        embedder,
        generator,
        store,
        pipeline_options(config),
    ))
}

/// Open the configured vector store backend.
pub async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    match config.store.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        "sqlite" => Ok(Arc::new(SqliteStore::open(&config.store.path).await?)),
        other => bail!("Unknown store backend: {}", other),
    }
}

pub fn pipeline_options(config: &Config) -> PipelineOptions {
    PipelineOptions {
        collection: config.store.collection.clone(),
        chunking: config.chunking.options(),
        top_k: config.retrieval.top_k,
        min_passage_chars: config.retrieval.min_passage_chars,
        index_policy: config.store.index_policy,
        embed_batch_size: config.embedding.batch_size,
        generation: params_from_config(&config.generation),
        generation_timeout: Duration::from_secs(config.generation.timeout_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> Config {
        let mut config = Config::minimal();
        config.embedding.provider = "hash".to_string();
        config.embedding.dims = Some(64);
        config.generation.provider = "disabled".to_string();
        config
    }

    #[test]
    fn test_options_follow_config() {
        let mut config = offline_config();
        config.retrieval.top_k = 5;
        config.generation.timeout_secs = 7;
        let options = pipeline_options(&config);
        assert_eq!(options.top_k, 5);
        assert_eq!(options.collection, "financial_documents");
        assert_eq!(options.generation_timeout, Duration::from_secs(7));
        assert!(!options.generation.do_sample);
    }

    #[tokio::test]
    async fn test_shared_pipeline_is_reused_until_shutdown() {
        let config = offline_config();
        let a = pipeline(&config).await.unwrap();
        let b = pipeline(&config).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        shutdown().await;
        let c = pipeline(&config).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        shutdown().await;
    }
}
