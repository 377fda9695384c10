//! Persistence abstraction for the vector index.
//!
//! The [`ChunkStore`] trait is the durable location the index is written
//! to and loaded from. Whether it holds any rows is the sole signal used to
//! decide "build vs. load" at startup.
//!
//! Implementations must be `Send + Sync` and must return rows from
//! [`load_all`](ChunkStore::load_all) in the order they were written.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::IndexedChunk;

pub use memory::InMemoryStore;

/// Durable storage for embedded chunks.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`count`](ChunkStore::count) | Number of persisted chunks |
/// | [`load_all`](ChunkStore::load_all) | Every chunk, in build order |
/// | [`replace_all`](ChunkStore::replace_all) | Atomically replace all contents |
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn count(&self) -> Result<usize>;

    async fn load_all(&self) -> Result<Vec<IndexedChunk>>;

    /// Replace everything previously stored. Never appends.
    ///
    /// `model` records which embedder produced the vectors.
    async fn replace_all(&self, chunks: &[IndexedChunk], model: &str) -> Result<()>;
}
