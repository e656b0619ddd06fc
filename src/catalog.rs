//! Persistent catalog of financial documents.
//!
//! The catalog is a plain record store behind the `/documents` routes:
//! title, company, document type, filing timestamp and full text, plus
//! creation and update timestamps. It is independent of the session
//! documents that `/ask` answers from; cataloguing a document does not
//! index it.
//!
//! Timestamps are stored as Unix seconds and served as RFC 3339.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use crate::config::Config;
use crate::{db, migrate};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_COMPANY_CHARS: usize = 200;
pub const MAX_DOC_TYPE_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Invalid(String),

    #[error("catalog database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A catalogued document as served by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogDocument {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub doc_type: String,
    pub date_filed: DateTime<Utc>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a document, or replacing one wholesale.
///
/// `date_filed` defaults to the time of the write.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub company: String,
    pub doc_type: String,
    pub content: String,
    #[serde(default)]
    pub date_filed: Option<DateTime<Utc>>,
}

/// A partial update; absent fields keep their stored values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub date_filed: Option<DateTime<Utc>>,
}

fn check_field(name: &str, value: &str, max_chars: usize) -> Result<(), CatalogError> {
    if value.trim().is_empty() {
        return Err(CatalogError::Invalid(format!("{} is required", name)));
    }
    let chars = value.chars().count();
    if chars > max_chars {
        return Err(CatalogError::Invalid(format!(
            "{} must be at most {} characters (got {})",
            name, max_chars, chars
        )));
    }
    Ok(())
}

impl NewDocument {
    fn validate(&self) -> Result<(), CatalogError> {
        check_field("title", &self.title, MAX_TITLE_CHARS)?;
        check_field("company", &self.company, MAX_COMPANY_CHARS)?;
        check_field("doc_type", &self.doc_type, MAX_DOC_TYPE_CHARS)?;
        Ok(())
    }
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> CatalogDocument {
    CatalogDocument {
        id: row.get("id"),
        title: row.get("title"),
        company: row.get("company"),
        doc_type: row.get("doc_type"),
        date_filed: from_unix(row.get("date_filed")),
        content: row.get("content"),
        created_at: from_unix(row.get("created_at")),
        updated_at: from_unix(row.get("updated_at")),
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, title, company, doc_type, date_filed, content, created_at, updated_at FROM documents";

/// SQLite-backed document catalog.
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the catalog alongside the configured store.
    ///
    /// The `sqlite` backend shares the store's database file; the `memory`
    /// backend gets a private in-memory database that lives as long as
    /// the process.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = match config.store.backend.as_str() {
            "sqlite" => db::connect(&config.store.path).await?,
            _ => db::connect_in_memory().await?,
        };
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    /// All documents, most recently filed first.
    pub async fn list(&self) -> Result<Vec<CatalogDocument>, CatalogError> {
        let rows = sqlx::query(&format!("{} ORDER BY date_filed DESC, id DESC", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_document).collect())
    }

    pub async fn get(&self, id: i64) -> Result<Option<CatalogDocument>, CatalogError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_document))
    }

    pub async fn create(&self, doc: NewDocument) -> Result<CatalogDocument, CatalogError> {
        doc.validate()?;
        let now = Utc::now().timestamp();
        let date_filed = doc.date_filed.map(|d| d.timestamp()).unwrap_or(now);

        let result = sqlx::query(
            "INSERT INTO documents (title, company, doc_type, date_filed, content, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&doc.title)
        .bind(&doc.company)
        .bind(&doc.doc_type)
        .bind(date_filed)
        .bind(&doc.content)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::debug!(id, title = %doc.title, "catalogued document");
        Ok(CatalogDocument {
            id,
            title: doc.title,
            company: doc.company,
            doc_type: doc.doc_type,
            date_filed: from_unix(date_filed),
            content: doc.content,
            created_at: from_unix(now),
            updated_at: from_unix(now),
        })
    }

    /// Replace every field of document `id`. `None` when it does not exist.
    pub async fn update(
        &self,
        id: i64,
        doc: NewDocument,
    ) -> Result<Option<CatalogDocument>, CatalogError> {
        doc.validate()?;
        let now = Utc::now().timestamp();
        let date_filed = doc.date_filed.map(|d| d.timestamp()).unwrap_or(now);

        let result = sqlx::query(
            "UPDATE documents SET title = ?, company = ?, doc_type = ?, date_filed = ?, \
             content = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&doc.title)
        .bind(&doc.company)
        .bind(&doc.doc_type)
        .bind(date_filed)
        .bind(&doc.content)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Apply the fields present in `patch`. `None` when `id` does not exist.
    pub async fn patch(
        &self,
        id: i64,
        patch: DocumentPatch,
    ) -> Result<Option<CatalogDocument>, CatalogError> {
        let Some(current) = self.get(id).await? else {
            return Ok(None);
        };

        let merged = NewDocument {
            title: patch.title.unwrap_or(current.title),
            company: patch.company.unwrap_or(current.company),
            doc_type: patch.doc_type.unwrap_or(current.doc_type),
            content: patch.content.unwrap_or(current.content),
            date_filed: Some(patch.date_filed.unwrap_or(current.date_filed)),
        };
        self.update(id, merged).await
    }

    /// Delete document `id`; `false` when it did not exist.
    pub async fn delete(&self, id: i64) -> Result<bool, CatalogError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
