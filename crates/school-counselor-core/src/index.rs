//! Vector index over embedded chunks.
//!
//! The index is built once (or loaded from its [`ChunkStore`]) and is
//! immutable afterwards, so it can be shared behind an `Arc` and queried
//! concurrently without locking. Rebuilding produces a new index value.
//!
//! # Build vs. load
//!
//! [`VectorIndex::open_or_build`] loads the store when it already holds
//! rows and only calls the chunk feed when it is empty. A build embeds every
//! chunk before touching the store, so an embedding failure leaves the
//! previous contents intact.
//!
//! # Query
//!
//! Brute-force cosine similarity over every stored vector. Results are
//! ordered nearest-first; equal scores keep build order.

use tracing::{debug, info, warn};

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{IndexError, RetrievalError};
use crate::models::{Chunk, IndexedChunk};
use crate::store::ChunkStore;

/// Default number of chunks sent to the embedder per call.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// How an index came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    /// Rows were read from a non-empty store.
    Loaded,
    /// Chunks were embedded and written to the store.
    Built,
}

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    /// Load from `store` if it has rows, otherwise build from `chunks()`.
    pub async fn open_or_build<F>(
        store: &dyn ChunkStore,
        embedder: &dyn Embedder,
        chunks: F,
        batch_size: usize,
    ) -> Result<(Self, IndexOrigin), IndexError>
    where
        F: FnOnce() -> Vec<Chunk>,
    {
        let existing = store.count().await.map_err(IndexError::Store)?;
        if existing > 0 {
            let entries = store.load_all().await.map_err(IndexError::Store)?;
            if let Some(first) = entries.first() {
                if embedder.dims() > 0 && first.embedding.len() != embedder.dims() {
                    warn!(
                        stored = first.embedding.len(),
                        expected = embedder.dims(),
                        "stored embeddings do not match the embedder's dimensions; run `index --rebuild`"
                    );
                }
            }
            info!(chunks = entries.len(), "loaded existing vector index");
            return Ok((Self { entries }, IndexOrigin::Loaded));
        }

        let index = Self::build(store, embedder, chunks(), batch_size).await?;
        Ok((index, IndexOrigin::Built))
    }

    /// Embed `chunks` and replace the store's contents with them.
    ///
    /// Nothing is written unless every chunk was embedded.
    pub async fn build(
        store: &dyn ChunkStore,
        embedder: &dyn Embedder,
        chunks: Vec<Chunk>,
        batch_size: usize,
    ) -> Result<Self, IndexError> {
        let batch_size = batch_size.max(1);
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = embedder
                .embed_batch(&texts)
                .await
                .map_err(IndexError::Embedding)?;
            if embedded.len() != texts.len() {
                return Err(IndexError::VectorCountMismatch {
                    expected: texts.len(),
                    got: embedded.len(),
                });
            }
            vectors.extend(embedded);
            debug!(done = vectors.len(), total = chunks.len(), "embedded batch");
        }

        let entries: Vec<IndexedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| IndexedChunk {
                id: uuid::Uuid::new_v4().to_string(),
                chunk,
                embedding,
            })
            .collect();

        store
            .replace_all(&entries, embedder.model_name())
            .await
            .map_err(IndexError::Store)?;

        info!(
            chunks = entries.len(),
            model = embedder.model_name(),
            "built vector index"
        );
        Ok(Self { entries })
    }

    /// The `k` chunks nearest to `text`, nearest first.
    ///
    /// An empty index returns an empty vec without calling the embedder.
    pub async fn query(
        &self,
        embedder: &dyn Embedder,
        text: &str,
        k: usize,
    ) -> Result<Vec<Chunk>, RetrievalError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embedder
            .embed(text)
            .await
            .map_err(RetrievalError::Embedding)?;

        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .entries
            .iter()
            .map(|e| {
                let score = cosine_similarity(&query_vec, &e.embedding);
                (if score.is_nan() { f32::NEG_INFINITY } else { score }, e)
            })
            .collect();
        // Stable sort: ties keep build order. NaN scores rank last.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, e)| e.chunk.clone())
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexedChunk] {
        &self.entries
    }
}
