//! Chunk, embed and persist documents

use super::chunker::chunk_pages;
use crate::config::{Settings, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::db::{NewChunk, VectorStore};
use crate::error::{RagError, Result};
use crate::llm::EmbeddingProvider;
use crate::providers::ProviderManager;
use serde::Serialize;
use std::sync::Arc;

/// Chunking window used by ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkWindow {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Split pages into chunks and embed them in one batch.
///
/// Blank pages produce nothing. When no chunk remains the embedder is not
/// called at all.
pub async fn ingest(
    pages: &[String],
    embedder: &dyn EmbeddingProvider,
    window: ChunkWindow,
) -> Result<Vec<NewChunk>> {
    let chunks = chunk_pages(pages, window.size, window.overlap);
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_documents(&texts).await?;
    if embeddings.len() != chunks.len() {
        return Err(RagError::provider(
            embedder.provider_name(),
            format!(
                "returned {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            ),
        ));
    }

    Ok(chunks
        .into_iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| NewChunk {
            chunk_index: chunk.index,
            content: chunk.text,
            embedding,
            page_number: Some(chunk.page_number),
        })
        .collect())
}

/// Outcome of a reindex run; one document failing never aborts the rest
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReindexReport {
    pub succeeded: Vec<i64>,
    pub failed: Vec<(i64, String)>,
}

/// Ingestion composed with storage
#[derive(Clone)]
pub struct IndexService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    window: ChunkWindow,
}

impl IndexService {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            window: ChunkWindow::default(),
        }
    }

    /// Use the embedding provider and chunk window selected by `settings`
    pub fn from_manager(
        manager: &ProviderManager,
        settings: &Settings,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        Ok(Self::new(store, manager.embedding(settings)?).with_window(ChunkWindow {
            size: settings.chunk_size,
            overlap: settings.chunk_overlap,
        }))
    }

    pub fn with_window(mut self, window: ChunkWindow) -> Self {
        self.window = window;
        self
    }

    /// Store a new document and its chunks; returns the id and chunk count.
    ///
    /// Chunks are embedded before anything is written, so an embedding
    /// failure leaves no document behind.
    pub async fn index_document(&self, filename: &str, pages: &[String]) -> Result<(i64, usize)> {
        self.embedder.ensure_ready().await?;
        let chunks = ingest(pages, self.embedder.as_ref(), self.window).await?;

        let id = self.store.insert_document(filename, pages).await?;
        if let Err(e) = self.store.replace_chunks(id, &chunks).await {
            let _ = self.store.delete_document(id).await;
            return Err(e);
        }

        tracing::info!(
            "Indexed {} ({} pages, {} chunks) as document {}",
            filename,
            pages.len(),
            chunks.len(),
            id
        );
        Ok((id, chunks.len()))
    }

    /// Rebuild one document's chunks with the current embedder
    pub async fn reindex(&self, id: i64) -> Result<usize> {
        let doc = self
            .store
            .get_document(id)
            .await?
            .ok_or(RagError::DocumentNotFound(id))?;

        self.embedder.ensure_ready().await?;
        let chunks = ingest(&doc.pages, self.embedder.as_ref(), self.window).await?;
        self.store.replace_chunks(id, &chunks).await?;

        tracing::info!("Reindexed document {} ({} chunks)", id, chunks.len());
        Ok(chunks.len())
    }

    /// Reindex every stored document independently
    pub async fn reindex_all(&self) -> Result<ReindexReport> {
        let documents = self.store.list_documents().await?;
        let mut ids: Vec<i64> = documents.iter().map(|d| d.id).collect();
        ids.sort_unstable();

        let mut report = ReindexReport::default();
        for id in ids {
            match self.reindex(id).await {
                Ok(_) => report.succeeded.push(id),
                Err(e) => {
                    tracing::warn!("Failed to reindex document {}: {}", id, e);
                    report.failed.push((id, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    pub async fn delete_document(&self, id: i64) -> Result<()> {
        if self.store.delete_document(id).await? {
            Ok(())
        } else {
            Err(RagError::DocumentNotFound(id))
        }
    }
}
