//! Fixed-window text chunker with overlap.
//!
//! Splits document text into [`Chunk`]s of at most `size` characters where
//! consecutive chunks of the same document share exactly `overlap`
//! characters. Sizes are counted in Unicode scalar values, never bytes, so a
//! window never splits a multi-byte character.
//!
//! Each chunk receives the parent's metadata verbatim, its window index, and
//! a SHA-256 hash of its text.
//!
//! # Algorithm
//!
//! 1. Skip documents whose text is empty or whitespace-only.
//! 2. If the text fits in one window, emit it unchanged.
//! 3. Otherwise emit windows starting at `0, step, 2·step, …` where
//!    `step = size - overlap`, stopping after the window that reaches the
//!    end of the text.
//!
//! # Example
//!
//! ```rust
//! use school_counselor_core::chunk::{split_text, ChunkParams};
//!
//! let params = ChunkParams::new(10, 4).unwrap();
//! let windows = split_text("abcdefghijklmnop", &params);
//! assert_eq!(windows, vec!["abcdefghij", "ghijklmnop"]);
//! ```

use sha2::{Digest, Sha256};

use crate::error::ChunkerError;
use crate::models::{Chunk, Document};

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Validated chunker parameters (`overlap < size`, `size > 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    size: usize,
    overlap: usize,
}

impl ChunkParams {
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        if size == 0 {
            return Err(ChunkerError::ZeroSize);
        }
        if overlap >= size {
            return Err(ChunkerError::OverlapTooLarge { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Split one text into overlapping windows.
///
/// Returns an empty vec for empty or whitespace-only text.
pub fn split_text(text: &str, params: &ChunkParams) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    // Byte offset of every char start, plus the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = bounds.len() - 1;

    if char_len <= params.size {
        return vec![text.to_string()];
    }

    let step = params.size - params.overlap;
    let mut windows = Vec::with_capacity(char_len / step + 1);
    let mut start = 0;
    loop {
        let end = (start + params.size).min(char_len);
        windows.push(text[bounds[start]..bounds[end]].to_string());
        if end == char_len {
            break;
        }
        start += step;
    }
    windows
}

/// Chunk a sequence of documents, copying each document's metadata onto
/// every chunk derived from it. Output order follows input order.
pub fn chunk_documents(documents: &[Document], params: &ChunkParams) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| {
            split_text(&doc.text, params)
                .into_iter()
                .enumerate()
                .map(move |(index, text)| make_chunk(doc, index, text))
        })
        .collect()
}

/// SHA-256 hex digest of a chunk's text.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn make_chunk(doc: &Document, index: usize, text: String) -> Chunk {
    Chunk {
        hash: hash_text(&text),
        metadata: doc.metadata.clone(),
        chunk_index: index,
        text,
    }
}
