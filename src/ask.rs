//! The `finrag ask` and `finrag chunk` commands.
//!
//! Both load documents from `--doc` paths via [`crate::documents`].
//! `ask` runs the full pipeline and prints the answer on stdout;
//! `chunk` stops after chunking and never touches a model or the store.

use anyhow::{bail, Result};
use std::path::PathBuf;

use finrag_core::chunk::chunk_documents;

use crate::config::Config;
use crate::documents::load_paths;
use crate::runtime;

/// Answer `query` from the documents at `docs`.
pub async fn run_ask(
    config: &Config,
    query: &str,
    docs: &[PathBuf],
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        bail!("Query is required");
    }

    let mut config = config.clone();
    if let Some(k) = top_k {
        if k == 0 {
            bail!("--top-k must be >= 1");
        }
        config.retrieval.top_k = k;
    }

    let documents = load_paths(docs)?;
    tracing::debug!(documents = documents.len(), "loaded documents for query");

    let pipeline = runtime::pipeline(&config).await?;
    let answer = pipeline.answer(&documents, query).await;
    runtime::shutdown().await;
    let answer = answer?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        println!("{}", answer.text);
    }
    Ok(())
}

/// Print the chunks the documents at `docs` would be indexed as.
pub fn run_chunk(config: &Config, docs: &[PathBuf]) -> Result<()> {
    let documents = load_paths(docs)?;
    let chunks = chunk_documents(&documents, &config.chunking.options());

    if chunks.is_empty() {
        println!("No chunks.");
        return Ok(());
    }

    for chunk in &chunks {
        println!(
            "{:<8} {:>5} chars  {}",
            chunk.id(),
            chunk.content.chars().count(),
            chunk.metadata.title
        );
    }
    println!();
    println!(
        "{} chunks from {} documents (chunk_size={}, chunk_overlap={})",
        chunks.len(),
        documents.len(),
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    Ok(())
}
