//! In-memory [`ChunkStore`] for tests and ephemeral runs.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Nothing survives the process.

use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::IndexedChunk;

use super::ChunkStore;

#[derive(Default)]
pub struct InMemoryStore {
    rows: RwLock<Vec<IndexedChunk>>,
    model: RwLock<Option<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model name recorded by the last `replace_all`.
    pub fn model(&self) -> Option<String> {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ChunkStore for InMemoryStore {
    async fn count(&self) -> Result<usize> {
        Ok(self.rows.read().unwrap_or_else(PoisonError::into_inner).len())
    }

    async fn load_all(&self) -> Result<Vec<IndexedChunk>> {
        Ok(self
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn replace_all(&self, chunks: &[IndexedChunk], model: &str) -> Result<()> {
        *self.rows.write().unwrap_or_else(PoisonError::into_inner) = chunks.to_vec();
        *self.model.write().unwrap_or_else(PoisonError::into_inner) = Some(model.to_string());
        Ok(())
    }
}
