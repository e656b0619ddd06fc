//! Error taxonomy for the pipeline.
//!
//! Store and embedding operations return `anyhow::Result` like the rest of
//! the crate; the variants below are the conditions callers need to tell
//! apart, recovered with `anyhow::Error::downcast_ref::<RagError>()`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// No documents, or documents that produced no chunks.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// An embedding or generation model could not be loaded or called.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The generation call did not finish within its deadline.
    #[error("model timed out after {}s", .0.as_secs_f64())]
    ModelTimeout(Duration),

    /// The vector store backend could not be reached.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl RagError {
    /// True when `err` is a [`RagError::CollectionNotFound`].
    pub fn is_collection_not_found(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::CollectionNotFound(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let e = RagError::ModelTimeout(Duration::from_millis(1500));
        assert_eq!(e.to_string(), "model timed out after 1.5s");
    }

    #[test]
    fn test_not_found_detection_through_anyhow() {
        let err: anyhow::Error = RagError::CollectionNotFound("x".into()).into();
        assert!(RagError::is_collection_not_found(&err));

        let other: anyhow::Error = RagError::StoreUnavailable("down".into()).into();
        assert!(!RagError::is_collection_not_found(&other));

        let plain = anyhow::anyhow!("collection not found: x");
        assert!(!RagError::is_collection_not_found(&plain));
    }
}
