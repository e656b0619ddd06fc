//! Recursive separator text chunker.
//!
//! Splits document text into overlapping [`Chunk`]s no longer than
//! `chunk_size` characters, preferring the coarsest boundary that works so
//! chunks rarely cut a sentence mid-word.
//!
//! # Algorithm
//!
//! 1. Pick the first separator in [`SEPARATORS`] that occurs in the text
//!    (paragraph break, line break, space, then single characters).
//! 2. Split on it, keeping each separator attached to the start of the
//!    piece that follows it. Empty pieces are dropped.
//! 3. Pieces shorter than `chunk_size` are collected. A piece that is too
//!    long flushes the collected pieces through the merge step, then is
//!    split again with the remaining, finer separators.
//! 4. Merge: pieces are appended greedily while the buffer stays within
//!    `chunk_size`. On overflow the buffer is emitted (trimmed) and pieces
//!    are dropped from its front until at most `chunk_overlap` characters
//!    remain and the next piece fits. That retained tail opens the next
//!    chunk, so neighbours share up to `chunk_overlap` characters.
//!
//! Lengths are counted in `char`s.
//!
//! # Example
//!
//! ```rust
//! use finrag_core::chunk::{chunk_documents, ChunkOptions};
//! use finrag_core::models::RawDocument;
//!
//! let docs = vec![RawDocument::uploaded("q1.txt", "Revenue grew 10% in Q1.")];
//! let chunks = chunk_documents(&docs, &ChunkOptions::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].id(), "0_0");
//! ```

use std::collections::VecDeque;

use anyhow::{bail, Result};

use crate::models::{Chunk, ChunkMetadata, RawDocument};
use crate::normalize::normalize_text;

/// Separators in priority order. The empty separator splits into characters.
pub const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Chunk sizing, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 300,
            chunk_overlap: 50,
        }
    }
}

impl ChunkOptions {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if self.chunk_overlap >= self.chunk_size {
            bail!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        Ok(())
    }
}

/// Normalize and chunk every document, in input order.
///
/// Chunk indices restart at 0 for each document and are contiguous.
/// Metadata is copied from the parent document. A document whose
/// normalized content is empty contributes no chunks.
pub fn chunk_documents(documents: &[RawDocument], options: &ChunkOptions) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for (document_index, doc) in documents.iter().enumerate() {
        let metadata = ChunkMetadata::from(doc);
        let text = normalize_text(&doc.content);

        for (chunk_index, content) in split_text(&text, options).into_iter().enumerate() {
            chunks.push(Chunk {
                document_index,
                chunk_index,
                content,
                metadata: metadata.clone(),
            });
        }
    }

    chunks
}

/// Split raw text into overlapping pieces. See the module docs.
pub fn split_text(text: &str, options: &ChunkOptions) -> Vec<String> {
    split_with(text, &SEPARATORS, options)
}

fn split_with(text: &str, separators: &[&str], options: &ChunkOptions) -> Vec<String> {
    let mut separator = separators.last().copied().unwrap_or("");
    let mut finer: &[&str] = &[];
    for (i, &sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            separator = sep;
            break;
        }
        if text.contains(sep) {
            separator = sep;
            finer = &separators[i + 1..];
            break;
        }
    }

    let mut chunks = Vec::new();
    let mut fitting: Vec<String> = Vec::new();

    for piece in split_keep_separator(text, separator) {
        if char_len(&piece) < options.chunk_size {
            fitting.push(piece);
            continue;
        }
        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, options));
            fitting.clear();
        }
        if finer.is_empty() {
            chunks.push(piece);
        } else {
            chunks.extend(split_with(&piece, finer, options));
        }
    }

    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, options));
    }

    chunks
}

/// Split on `separator`, prefixing every piece after the first with it.
fn split_keep_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut parts = text.split(separator);
    let mut pieces = Vec::new();
    if let Some(first) = parts.next() {
        if !first.is_empty() {
            pieces.push(first.to_string());
        }
    }
    for part in parts {
        pieces.push(format!("{}{}", separator, part));
    }
    pieces
}

fn merge_pieces(pieces: &[String], options: &ChunkOptions) -> Vec<String> {
    let mut merged = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);

        if total + len > options.chunk_size && !window.is_empty() {
            if let Some(text) = join_window(&window) {
                merged.push(text);
            }
            while total > options.chunk_overlap
                || (total + len > options.chunk_size && total > 0)
            {
                match window.pop_front() {
                    Some(front) => total -= char_len(front),
                    None => break,
                }
            }
        }

        window.push_back(piece.as_str());
        total += len;
    }

    if let Some(text) = join_window(&window) {
        merged.push(text);
    }

    merged
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str) -> RawDocument {
        RawDocument {
            title: "Annual Report".to_string(),
            company: "Acme".to_string(),
            doc_type: "10-K".to_string(),
            content: content.to_string(),
            date_filed: None,
        }
    }

    fn numbered_words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_short_document_single_chunk() {
        let chunks = chunk_documents(&[doc("Revenue grew 10% in Q1.")], &ChunkOptions::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].content, "Revenue grew 10% in Q1.");
    }

    #[test]
    fn test_empty_document_no_chunks() {
        assert!(chunk_documents(&[doc("")], &ChunkOptions::default()).is_empty());
        assert!(chunk_documents(&[doc(" \n\t ")], &ChunkOptions::default()).is_empty());
    }

    #[test]
    fn test_indices_restart_per_document() {
        let long = numbered_words(300);
        let chunks = chunk_documents(&[doc(&long), doc("tiny"), doc(&long)], &ChunkOptions::default());

        for document_index in 0..3 {
            let indices: Vec<usize> = chunks
                .iter()
                .filter(|c| c.document_index == document_index)
                .map(|c| c.chunk_index)
                .collect();
            let expected: Vec<usize> = (0..indices.len()).collect();
            assert_eq!(indices, expected, "gap or repeat in document {}", document_index);
        }
        assert_eq!(
            chunks.iter().filter(|c| c.document_index == 1).count(),
            1
        );
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let opts = ChunkOptions::default();
        for c in chunk_documents(&[doc(&numbered_words(1000))], &opts) {
            assert!(c.content.chars().count() <= opts.chunk_size);
        }
    }

    #[test]
    fn test_chunks_cover_whole_document() {
        let text = numbered_words(800);
        let opts = ChunkOptions::default();
        let chunks = chunk_documents(&[doc(&text)], &opts);
        assert!(chunks.len() > 1);

        let mut covered = vec![false; text.len()];
        let mut search_from = 0;
        for c in &chunks {
            let pos = search_from
                + text[search_from..]
                    .find(&c.content)
                    .expect("chunk is a span of the normalized text");
            for flag in covered.iter_mut().skip(pos).take(c.content.len()) {
                *flag = true;
            }
            search_from = pos + 1;
        }

        for (i, b) in text.bytes().enumerate() {
            if b != b' ' {
                assert!(covered[i], "byte {} dropped", i);
            }
        }
    }

    #[test]
    fn test_neighbours_overlap() {
        let opts = ChunkOptions::default();
        let chunks = chunk_documents(&[doc(&numbered_words(600))], &opts);

        for pair in chunks.windows(2) {
            let first_word = pair[1].content.split(' ').next().unwrap();
            assert!(
                pair[0].content.contains(first_word),
                "no shared span between {} and {}",
                pair[0].id(),
                pair[1].id()
            );
            let shared = (1..=pair[1].content.len())
                .rev()
                .find(|&k| pair[0].content.ends_with(&pair[1].content[..k]))
                .unwrap_or(0);
            assert!(shared > 0 && shared <= opts.chunk_overlap);
        }
    }

    #[test]
    fn test_metadata_copied_verbatim() {
        let mut d = doc(&numbered_words(400));
        d.date_filed = chrono::NaiveDate::from_ymd_opt(2023, 12, 31);
        let chunks = chunk_documents(&[d.clone()], &ChunkOptions::default());
        let expected = ChunkMetadata::from(&d);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.metadata == expected));
    }

    #[test]
    fn test_paragraphs_preferred_over_words() {
        let opts = ChunkOptions {
            chunk_size: 40,
            chunk_overlap: 0,
        };
        let text = "First paragraph is here.\n\nSecond paragraph is here.";
        let pieces = split_text(text, &opts);
        assert_eq!(
            pieces,
            vec!["First paragraph is here.", "Second paragraph is here."]
        );
    }

    #[test]
    fn test_small_paragraphs_merge() {
        let text = "Alpha.\n\nBeta.\n\nGamma.";
        let pieces = split_text(text, &ChunkOptions::default());
        assert_eq!(pieces, vec![text.to_string()]);
    }

    #[test]
    fn test_unbroken_run_falls_back_to_characters() {
        let opts = ChunkOptions {
            chunk_size: 10,
            chunk_overlap: 2,
        };
        let pieces = split_text(&"x".repeat(25), &opts);
        assert!(pieces.len() >= 3);
        assert!(pieces.iter().all(|p| p.len() <= 10));
        assert_eq!(pieces[0], "x".repeat(10));
        assert_eq!(pieces[1].len(), 10);
    }

    #[test]
    fn test_deterministic() {
        let docs = vec![doc(&numbered_words(500))];
        let a = chunk_documents(&docs, &ChunkOptions::default());
        let b = chunk_documents(&docs, &ChunkOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_validate_options() {
        assert!(ChunkOptions::default().validate().is_ok());
        assert!(ChunkOptions {
            chunk_size: 0,
            chunk_overlap: 0
        }
        .validate()
        .is_err());
        assert!(ChunkOptions {
            chunk_size: 50,
            chunk_overlap: 50
        }
        .validate()
        .is_err());
    }
}
