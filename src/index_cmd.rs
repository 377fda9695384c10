//! `counselor index` and `counselor sources`.
//!
//! The index is built once and reused: when the SQLite file already holds
//! chunks it is loaded as-is and the data directory is not read at all.
//! `--rebuild` re-reads every source and replaces the stored index.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::info;

use school_counselor_core::chunk::{chunk_documents, ChunkParams};
use school_counselor_core::index::IndexOrigin;
use school_counselor_core::store::ChunkStore;
use school_counselor_core::{Chunk, Embedder, VectorIndex};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::sources::load_sources;
use crate::sqlite_store::SqliteStore;

/// Load every source and chunk it.
pub fn load_chunks(config: &Config) -> Result<Vec<Chunk>> {
    let params = ChunkParams::new(config.chunking.size, config.chunking.overlap)?;
    let report = load_sources(&config.data, &config.record_loader())?;
    let chunks = chunk_documents(&report.documents, &params);
    info!(
        documents = report.documents.len(),
        chunks = chunks.len(),
        "chunked sources"
    );
    Ok(chunks)
}

/// Load the persisted index, or build it from the data directory.
pub async fn open_index(
    config: &Config,
    store: &SqliteStore,
    embedder: &dyn Embedder,
    rebuild: bool,
) -> Result<(VectorIndex, IndexOrigin)> {
    let batch_size = config.embedding.batch_size;

    if rebuild || store.count().await? == 0 {
        let chunks = load_chunks(config)?;
        let index = VectorIndex::build(store, embedder, chunks, batch_size).await?;
        return Ok((index, IndexOrigin::Built));
    }

    Ok(VectorIndex::open_or_build(store, embedder, Vec::new, batch_size).await?)
}

pub async fn run_index(config: &Config, rebuild: bool) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let embedder: Arc<dyn Embedder> = create_embedder(&config.embedding)?;
    let store = SqliteStore::open(&config.index.path).await?;
    let (index, origin) = open_index(config, &store, embedder.as_ref(), rebuild).await?;

    println!("index");
    println!("  path: {}", config.index.path.display());
    println!(
        "  status: {}",
        match origin {
            IndexOrigin::Loaded => "loaded existing index (use --rebuild to re-read sources)",
            IndexOrigin::Built => "built from sources",
        }
    );
    println!("  chunks: {}", index.len());
    if let Some(info) = store.info().await? {
        println!("  model: {} ({} dims)", info.model, info.dims);
    }

    store.close().await;
    Ok(())
}

/// List discovered sources and any that failed to load.
pub fn run_sources(config: &Config) -> Result<()> {
    let report = load_sources(&config.data, &config.record_loader())?;

    println!("{:<48} DOCUMENTS", "SOURCE");
    for source in &report.loaded {
        println!("{:<48} {}", source.file, source.documents);
    }
    if !report.failures.is_empty() {
        println!();
        println!("skipped:");
        for failure in &report.failures {
            println!("  {}", failure);
        }
    }
    println!();
    println!(
        "{} sources, {} documents, {} skipped",
        report.loaded.len(),
        report.documents.len(),
        report.failures.len()
    );
    Ok(())
}
