//! Core data models that flow through the question-answering pipeline.
//!
//! A [`RawDocument`] is supplied by the caller for a single run. The chunker
//! turns it into [`Chunk`]s, the vector store owns them as [`IndexedChunk`]s,
//! and each query produces transient [`RetrievedPassage`]s.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A document handed to the pipeline by the document source.
///
/// `content` is plain text; extracted tables arrive as pipe-delimited rows
/// and are treated like any other text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub title: String,
    pub company: String,
    pub doc_type: String,
    pub content: String,
    #[serde(default)]
    pub date_filed: Option<NaiveDate>,
}

impl RawDocument {
    /// A document produced by a file upload, with placeholder catalog fields.
    pub fn uploaded(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            company: "Unknown".to_string(),
            doc_type: "uploaded".to_string(),
            content: content.into(),
            date_filed: None,
        }
    }
}

/// Document-level metadata carried by every chunk.
///
/// All fields are strings so the shape matches what the vector store
/// persists. `date_filed` is `YYYY-MM-DD`, or `"None"` when the document
/// has no filing date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub title: String,
    pub company: String,
    pub doc_type: String,
    pub date_filed: String,
}

impl From<&RawDocument> for ChunkMetadata {
    fn from(doc: &RawDocument) -> Self {
        Self {
            title: doc.title.clone(),
            company: doc.company.clone(),
            doc_type: doc.doc_type.clone(),
            date_filed: doc
                .date_filed
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "None".to_string()),
        }
    }
}

/// A contiguous span of one document's normalized text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the parent document in the input set.
    pub document_index: usize,
    /// 0-based sequence number within the parent document.
    pub chunk_index: usize,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Stable store id: `"{document_index}_{chunk_index}"`.
    pub fn id(&self) -> String {
        format!("{}_{}", self.document_index, self.chunk_index)
    }
}

/// A chunk paired with its embedding, as held by a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl IndexedChunk {
    pub fn new(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk.id(),
            content: chunk.content.clone(),
            embedding,
            metadata: chunk.metadata.clone(),
        }
    }
}

/// A passage returned for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity to the query embedding.
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_copies_document_fields() {
        let doc = RawDocument {
            title: "10-K 2023".to_string(),
            company: "Acme Corp".to_string(),
            doc_type: "10-K".to_string(),
            content: String::new(),
            date_filed: NaiveDate::from_ymd_opt(2024, 2, 29),
        };
        let meta = ChunkMetadata::from(&doc);
        assert_eq!(meta.title, "10-K 2023");
        assert_eq!(meta.company, "Acme Corp");
        assert_eq!(meta.doc_type, "10-K");
        assert_eq!(meta.date_filed, "2024-02-29");
    }

    #[test]
    fn test_missing_date_renders_none() {
        let doc = RawDocument::uploaded("notes.txt", "body");
        assert_eq!(ChunkMetadata::from(&doc).date_filed, "None");
        assert_eq!(doc.company, "Unknown");
        assert_eq!(doc.doc_type, "uploaded");
    }

    #[test]
    fn test_chunk_id_format() {
        let chunk = Chunk {
            document_index: 2,
            chunk_index: 7,
            content: "x".to_string(),
            metadata: ChunkMetadata::from(&RawDocument::uploaded("a", "x")),
        };
        assert_eq!(chunk.id(), "2_7");
        assert_eq!(IndexedChunk::new(&chunk, vec![1.0]).id, "2_7");
    }

    #[test]
    fn test_raw_document_deserializes_without_date() {
        let doc: RawDocument = serde_json::from_str(
            r#"{"title":"t","company":"c","doc_type":"d","content":"body"}"#,
        )
        .unwrap();
        assert!(doc.date_filed.is_none());
    }
}
