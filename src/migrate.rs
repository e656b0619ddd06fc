//! Database schema.
//!
//! The vector store uses two tables: `collections` (name, distance,
//! chunk-set fingerprint) and `entries` (one row per indexed chunk,
//! embedding stored as a little-endian `f32` BLOB, metadata as plain
//! columns). The document catalog lives in `documents`. Every statement
//! is idempotent.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the database file and schema for the configured store.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(&config.store.path).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema to an open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            distance TEXT NOT NULL DEFAULT 'cosine',
            fingerprint TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            title TEXT NOT NULL,
            company TEXT NOT NULL,
            doc_type TEXT NOT NULL,
            date_filed TEXT NOT NULL,
            PRIMARY KEY (collection, id),
            FOREIGN KEY (collection) REFERENCES collections(name) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_collection ON entries(collection)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            company TEXT NOT NULL,
            doc_type TEXT NOT NULL,
            date_filed INTEGER NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
