//! Error taxonomy for the answer pipeline.
//!
//! Source errors are collected per source and never abort ingestion.
//! Index errors abort a build before anything is persisted. Retrieval
//! errors are recovered by the responder. The classifier has no error path.

use thiserror::Error;

/// A single source could not be turned into documents.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{file}: malformed structured data: {reason}")]
    Malformed { file: String, reason: String },
    #[error("{file}: unreadable: {reason}")]
    Unreadable { file: String, reason: String },
}

impl SourceError {
    /// Name of the source the error belongs to.
    pub fn file(&self) -> &str {
        match self {
            SourceError::Malformed { file, .. } | SourceError::Unreadable { file, .. } => file,
        }
    }
}

/// Failure while building the vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding failed while building index: {0:#}")]
    Embedding(anyhow::Error),
    #[error("embedder returned {got} vectors for {expected} chunks")]
    VectorCountMismatch { expected: usize, got: usize },
    #[error("index store error: {0:#}")]
    Store(anyhow::Error),
}

/// Failure while answering a nearest-neighbor query.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("query embedding failed: {0:#}")]
    Embedding(anyhow::Error),
}

/// Invalid chunker parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkerError {
    #[error("chunk size must be > 0")]
    ZeroSize,
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}
