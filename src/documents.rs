//! Document loading for the CLI and the upload endpoint.
//!
//! Supported inputs:
//! - `.json`: an array of documents with `title`, `company`, `doc_type`,
//!   `content` and an optional `date_filed` (`YYYY-MM-DD`);
//! - `.txt` / `.md`: UTF-8 text (invalid bytes are replaced);
//! - `.pdf`: text extracted with `pdf-extract`.
//!
//! Text and PDF files become upload-style documents: title is the file
//! name, company `"Unknown"`, doc type `"uploaded"`, no filing date.
//! Directories are walked recursively in path order; files with other
//! extensions inside a directory are skipped.
//!
//! PDF tables are not reconstructed. `pdf-extract` yields page text only,
//! so table cells arrive in reading order separated by whitespace rather
//! than as pipe-delimited rows.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use finrag_core::models::RawDocument;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported document type: {0} (expected .json, .txt, .md or .pdf)")]
    Unsupported(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("invalid document list: {0}")]
    Json(#[from] serde_json::Error),
}

/// File kinds the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Json,
    Text,
    Pdf,
}

impl DocumentKind {
    /// Classify by extension (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".json") {
            Some(DocumentKind::Json)
        } else if lower.ends_with(".txt") || lower.ends_with(".md") {
            Some(DocumentKind::Text)
        } else if lower.ends_with(".pdf") {
            Some(DocumentKind::Pdf)
        } else {
            None
        }
    }
}

/// Extract plain text from an uploaded text or PDF file.
pub fn extract_text(bytes: &[u8], file_name: &str) -> Result<String, DocumentError> {
    match DocumentKind::from_name(file_name) {
        Some(DocumentKind::Text) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        Some(DocumentKind::Pdf) => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| DocumentError::Pdf(e.to_string()))
        }
        _ => Err(DocumentError::Unsupported(file_name.to_string())),
    }
}

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the document for a file posted to the upload endpoint.
///
/// The extracted text has its whitespace collapsed, so PDF line breaks and
/// page gaps do not leak into chunks.
pub fn upload_from_bytes(file_name: &str, bytes: &[u8]) -> Result<RawDocument, DocumentError> {
    let content = collapse_whitespace(&extract_text(bytes, file_name)?);
    Ok(RawDocument::uploaded(file_name, content))
}

/// Parse a JSON array of documents.
pub fn parse_document_list(bytes: &[u8]) -> Result<Vec<RawDocument>, DocumentError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Load the documents in one file.
pub fn load_file(path: &Path) -> Result<Vec<RawDocument>> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let kind = DocumentKind::from_name(&name)
        .ok_or_else(|| DocumentError::Unsupported(path.display().to_string()))?;

    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let docs = match kind {
        DocumentKind::Json => parse_document_list(&bytes)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        DocumentKind::Text | DocumentKind::Pdf => {
            let content = extract_text(&bytes, &name)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            vec![RawDocument::uploaded(name, content)]
        }
    };

    tracing::debug!(path = %path.display(), documents = docs.len(), "loaded documents");
    Ok(docs)
}

/// Load every document named by `paths`, in order.
///
/// A directory contributes its supported files sorted by path.
pub fn load_paths(paths: &[PathBuf]) -> Result<Vec<RawDocument>> {
    let mut docs = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut files: Vec<PathBuf> = Vec::new();
            for entry in WalkDir::new(path) {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy();
                if DocumentKind::from_name(&name).is_some() {
                    files.push(entry.path().to_path_buf());
                }
            }
            files.sort();
            for file in files {
                docs.extend(load_file(&file)?);
            }
        } else {
            docs.extend(load_file(path)?);
        }
    }

    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_kind_from_name() {
        assert_eq!(DocumentKind::from_name("10-K.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_name("notes.md"), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_name("docs.json"), Some(DocumentKind::Json));
        assert_eq!(DocumentKind::from_name("sheet.xlsx"), None);
    }

    #[test]
    fn test_text_file_becomes_upload_document() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("q1.txt");
        fs::write(&path, "Revenue grew 10% in Q1.").unwrap();

        let docs = load_file(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "q1.txt");
        assert_eq!(docs[0].company, "Unknown");
        assert_eq!(docs[0].doc_type, "uploaded");
        assert!(docs[0].date_filed.is_none());
        assert_eq!(docs[0].content, "Revenue grew 10% in Q1.");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(
            collapse_whitespace("  Revenue\tgrew\n\n10%   in Q1.\r\n"),
            "Revenue grew 10% in Q1."
        );
        assert_eq!(collapse_whitespace(" \n\t "), "");
    }

    #[test]
    fn test_upload_from_bytes() {
        let doc = upload_from_bytes("q1.txt", b"Revenue grew\n\n  10% in Q1.\n").unwrap();
        assert_eq!(doc.title, "q1.txt");
        assert_eq!(doc.company, "Unknown");
        assert_eq!(doc.doc_type, "uploaded");
        assert_eq!(doc.content, "Revenue grew 10% in Q1.");

        assert!(matches!(
            upload_from_bytes("deck.pptx", b"slides"),
            Err(DocumentError::Unsupported(_))
        ));
        assert!(matches!(
            upload_from_bytes("10-K.pdf", b"not a pdf"),
            Err(DocumentError::Pdf(_))
        ));
    }

    #[test]
    fn test_json_document_list() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("docs.json");
        fs::write(
            &path,
            r#"[
                {"title": "FY23 10-K", "company": "Acme", "doc_type": "10-K",
                 "content": "Net income was $4.2M.", "date_filed": "2024-02-15"},
                {"title": "Q1", "company": "Acme", "doc_type": "10-Q", "content": "Q1 text"}
            ]"#,
        )
        .unwrap();

        let docs = load_file(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].company, "Acme");
        assert_eq!(
            docs[0].date_filed,
            chrono::NaiveDate::from_ymd_opt(2024, 2, 15)
        );
        assert!(docs[1].date_filed.is_none());
    }

    #[test]
    fn test_directory_walk_is_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("nested")).unwrap();
        fs::write(tmp.path().join("b.txt"), "second").unwrap();
        fs::write(tmp.path().join("a.md"), "first").unwrap();
        fs::write(tmp.path().join("nested/c.txt"), "third").unwrap();
        fs::write(tmp.path().join("ignored.csv"), "x,y").unwrap();

        let docs = load_paths(&[tmp.path().to_path_buf()]).unwrap();
        let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["a.md", "b.txt", "c.txt"]);
    }

    #[test]
    fn test_unsupported_file_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("deck.pptx");
        fs::write(&path, b"PK").unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported document type"));
    }

    #[test]
    fn test_broken_pdf_is_an_error() {
        assert!(matches!(
            extract_text(b"not a pdf", "report.pdf"),
            Err(DocumentError::Pdf(_))
        ));
    }
}
