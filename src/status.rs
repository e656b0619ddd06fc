//! The `finrag status` and `finrag clear` commands.
//!
//! Both open only the configured vector store; no model is loaded.

use anyhow::Result;

use finrag_core::error::RagError;
use finrag_core::index::clear_collection;

use crate::config::Config;
use crate::runtime::open_store;

/// Print the collection name, backend and entry count.
pub async fn run_status(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let count = match store.count(&config.store.collection).await {
        Ok(n) => Some(n),
        Err(e) if RagError::is_collection_not_found(&e) => None,
        Err(e) => return Err(e),
    };

    println!("Collection:  {}", config.store.collection);
    match config.store.backend.as_str() {
        "sqlite" => println!(
            "Backend:     sqlite ({})",
            config.store.path.display()
        ),
        other => println!("Backend:     {}", other),
    }
    match count {
        Some(n) => println!("Entries:     {}", n),
        None => println!("Entries:     0 (collection not created)"),
    }
    println!("Embedding:   {}", config.embedding.provider);
    println!("Generation:  {}", config.generation.provider);
    Ok(())
}

/// Delete the collection. A missing collection is not an error.
pub async fn run_clear(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    if clear_collection(store.as_ref(), &config.store.collection).await? {
        println!("Cleared collection {}.", config.store.collection);
    } else {
        println!(
            "Collection {} does not exist; nothing to clear.",
            config.store.collection
        );
    }
    Ok(())
}
