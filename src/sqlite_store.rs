//! SQLite-backed [`ChunkStore`].
//!
//! Rows live in the `chunks` table created by [`run_migrations`]; vectors
//! are little-endian f32 blobs. `replace_all` runs in one transaction, so a
//! crash mid-write leaves the previous index intact.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use school_counselor_core::embedding::{blob_to_vec, vec_to_blob};
use school_counselor_core::models::IndexedChunk;
use school_counselor_core::store::ChunkStore;
use school_counselor_core::Chunk;

use crate::db;
use crate::migrate::run_migrations;

/// Summary row written with every build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub model: String,
    pub dims: usize,
    pub chunk_count: usize,
    pub built_at: i64,
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the index file at `path`, creating tables as needed.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path)
            .await
            .with_context(|| format!("Failed to open index database: {}", path.display()))?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn info(&self) -> Result<Option<IndexInfo>> {
        let row = sqlx::query(
            "SELECT model, dims, chunk_count, built_at FROM index_info WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| IndexInfo {
            model: r.get("model"),
            dims: r.get::<i64, _>("dims") as usize,
            chunk_count: r.get::<i64, _>("chunk_count") as usize,
            built_at: r.get("built_at"),
        }))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn load_all(&self) -> Result<Vec<IndexedChunk>> {
        let rows = sqlx::query(
            "SELECT id, chunk_index, text, metadata_json, hash, embedding FROM chunks ORDER BY position",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let metadata_json: String = row.get("metadata_json");
                let metadata = serde_json::from_str(&metadata_json)
                    .with_context(|| format!("corrupt metadata for chunk {}", id))?;
                let blob: Vec<u8> = row.get("embedding");
                Ok(IndexedChunk {
                    chunk: Chunk {
                        text: row.get("text"),
                        metadata,
                        chunk_index: row.get::<i64, _>("chunk_index") as usize,
                        hash: row.get("hash"),
                    },
                    embedding: blob_to_vec(&blob),
                    id,
                })
            })
            .collect()
    }

    async fn replace_all(&self, chunks: &[IndexedChunk], model: &str) -> Result<()> {
        let dims = chunks.first().map_or(0, |c| c.embedding.len());
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;

        for (position, indexed) in chunks.iter().enumerate() {
            let metadata_json = serde_json::to_string(&indexed.chunk.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, position, chunk_index, text, metadata_json, hash, model, dims, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&indexed.id)
            .bind(position as i64)
            .bind(indexed.chunk.chunk_index as i64)
            .bind(&indexed.chunk.text)
            .bind(&metadata_json)
            .bind(&indexed.chunk.hash)
            .bind(model)
            .bind(indexed.embedding.len() as i64)
            .bind(vec_to_blob(&indexed.embedding))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO index_info (id, model, dims, chunk_count, built_at)
            VALUES (1, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                model = excluded.model,
                dims = excluded.dims,
                chunk_count = excluded.chunk_count,
                built_at = excluded.built_at
            "#,
        )
        .bind(model)
        .bind(dims as i64)
        .bind(chunks.len() as i64)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use school_counselor_core::models::{Metadata, META_SOURCE_FILE};

    fn row(id: &str, text: &str, embedding: Vec<f32>) -> IndexedChunk {
        let mut metadata = Metadata::new();
        metadata.insert(META_SOURCE_FILE.into(), "faq.json".into());
        IndexedChunk {
            id: id.into(),
            chunk: Chunk {
                text: text.into(),
                metadata,
                chunk_index: 0,
                hash: "h".into(),
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn test_replace_all_round_trips_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&tmp.path().join("nested/index.sqlite"))
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.info().await.unwrap().is_none());

        let rows = vec![
            row("b", "second written first", vec![0.5, -1.0]),
            row("a", "then this", vec![0.25, 2.0]),
        ];
        store.replace_all(&rows, "test-model").await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded, rows);

        let info = store.info().await.unwrap().unwrap();
        assert_eq!(info.model, "test-model");
        assert_eq!(info.dims, 2);
        assert_eq!(info.chunk_count, 2);
    }

    #[tokio::test]
    async fn test_replace_all_never_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&tmp.path().join("index.sqlite")).await.unwrap();
        store
            .replace_all(&[row("a", "one", vec![1.0]), row("b", "two", vec![2.0])], "m")
            .await
            .unwrap();
        store.replace_all(&[row("c", "three", vec![3.0])], "m").await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "c");
    }
}
