//! SQLite-backed [`VectorStore`] implementation.
//!
//! Collections and their entries persist across processes. Search loads
//! every embedding in the collection and ranks by cosine similarity in
//! Rust; ties keep insertion (rowid) order.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use finrag_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use finrag_core::error::RagError;
use finrag_core::models::{ChunkMetadata, IndexedChunk};
use finrag_core::store::{CollectionInfo, Distance, StoreHit, VectorStore};

use crate::{db, migrate};

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `path` and make sure the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await.map_err(|e| {
            RagError::StoreUnavailable(format!("cannot open {}: {}", path.display(), e))
        })?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn require(&self, collection: &str) -> Result<()> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM collections WHERE name = ?")
                .bind(collection)
                .fetch_one(&self.pool)
                .await?;
        if exists {
            Ok(())
        } else {
            Err(RagError::CollectionNotFound(collection.to_string()).into())
        }
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn ensure_collection(&self, name: &str) -> Result<CollectionInfo> {
        let now = chrono::Utc::now().timestamp();
        let inserted = sqlx::query(
            "INSERT INTO collections (name, distance, created_at) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(Distance::Cosine.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let row = sqlx::query(
            r#"
            SELECT c.fingerprint,
                   (SELECT COUNT(*) FROM entries e WHERE e.collection = c.name) AS count
            FROM collections c
            WHERE c.name = ?
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.get("count");
        Ok(CollectionInfo {
            name: name.to_string(),
            distance: Distance::Cosine,
            count: count as usize,
            fingerprint: row.get("fingerprint"),
            created: inserted > 0,
        })
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.require(collection).await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn add(&self, collection: &str, entries: &[IndexedChunk]) -> Result<()> {
        self.require(collection).await?;
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO entries (collection, id, content, embedding,
                                     title, company, doc_type, date_filed)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    content = excluded.content,
                    embedding = excluded.embedding,
                    title = excluded.title,
                    company = excluded.company,
                    doc_type = excluded.doc_type,
                    date_filed = excluded.date_filed
                "#,
            )
            .bind(collection)
            .bind(&entry.id)
            .bind(&entry.content)
            .bind(vec_to_blob(&entry.embedding))
            .bind(&entry.metadata.title)
            .bind(&entry.metadata.company)
            .bind(&entry.metadata.doc_type)
            .bind(&entry.metadata.date_filed)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn reset(&self, collection: &str) -> Result<()> {
        self.require(collection).await?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM entries WHERE collection = ?")
            .bind(collection)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE collections SET fingerprint = NULL WHERE name = ?")
            .bind(collection)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn set_fingerprint(&self, collection: &str, fingerprint: Option<&str>) -> Result<()> {
        let updated = sqlx::query("UPDATE collections SET fingerprint = ? WHERE name = ?")
            .bind(fingerprint)
            .bind(collection)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(RagError::CollectionNotFound(collection.to_string()).into());
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query_vec: &[f32],
        top_k: usize,
    ) -> Result<Vec<StoreHit>> {
        self.require(collection).await?;
        let rows = sqlx::query(
            r#"
            SELECT id, content, embedding, title, company, doc_type, date_filed
            FROM entries
            WHERE collection = ?
            ORDER BY rowid
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<StoreHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                StoreHit {
                    id: row.get("id"),
                    content: row.get("content"),
                    metadata: ChunkMetadata {
                        title: row.get("title"),
                        company: row.get("company"),
                        doc_type: row.get("doc_type"),
                        date_filed: row.get("date_filed"),
                    },
                    score: cosine_similarity(query_vec, &blob_to_vec(&blob)),
                }
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
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM entries WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        if removed == 0 {
            return Err(RagError::CollectionNotFound(name.to_string()).into());
        }
        Ok(())
    }
}
