//! Session-scoped document staging.
//!
//! Uploaded documents are held in memory for the lifetime of the server
//! and form the document set for every `/ask`. Nothing here is persisted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use finrag_core::models::RawDocument;

struct StagedDocument {
    document: RawDocument,
    uploaded_at: DateTime<Utc>,
}

/// Summary of one staged document, as listed by `GET /loaded_docs`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub index: usize,
    pub title: String,
    pub company: String,
    pub doc_type: String,
    pub date_filed: Option<NaiveDate>,
    pub chars: usize,
    pub uploaded_at: DateTime<Utc>,
}

/// The working document set of one server session.
#[derive(Default)]
pub struct SessionDocuments {
    staged: RwLock<Vec<StagedDocument>>,
}

impl SessionDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a document. Returns the number of staged documents.
    pub async fn add(&self, document: RawDocument) -> usize {
        let mut staged = self.staged.write().await;
        staged.push(StagedDocument {
            document,
            uploaded_at: Utc::now(),
        });
        staged.len()
    }

    /// Copy of the staged documents, in upload order.
    pub async fn snapshot(&self) -> Vec<RawDocument> {
        self.staged
            .read()
            .await
            .iter()
            .map(|s| s.document.clone())
            .collect()
    }

    pub async fn summaries(&self) -> Vec<DocumentSummary> {
        self.staged
            .read()
            .await
            .iter()
            .enumerate()
            .map(|(index, s)| DocumentSummary {
                index,
                title: s.document.title.clone(),
                company: s.document.company.clone(),
                doc_type: s.document.doc_type.clone(),
                date_filed: s.document.date_filed,
                chars: s.document.content.chars().count(),
                uploaded_at: s.uploaded_at,
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.staged.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every staged document. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let mut staged = self.staged.write().await;
        let removed = staged.len();
        staged.clear();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stage_list_and_clear() {
        let session = SessionDocuments::new();
        assert!(session.is_empty().await);

        assert_eq!(session.add(RawDocument::uploaded("a.txt", "alpha")).await, 1);
        assert_eq!(session.add(RawDocument::uploaded("b.pdf", "beta beta")).await, 2);

        let summaries = session.summaries().await;
        assert_eq!(summaries[1].title, "b.pdf");
        assert_eq!(summaries[1].chars, 9);
        assert_eq!(session.snapshot().await[0].content, "alpha");

        assert_eq!(session.clear().await, 2);
        assert_eq!(session.len().await, 0);
    }
}
