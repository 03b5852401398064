//! Database layer for ragdoc
//!
//! Provides SQLite-based storage with:
//! - Documents with their raw page text, kept for reindexing
//! - Embedded chunks ranked by an in-database `cosine_distance` function
//!
//! The pipelines only see the [`VectorStore`] trait; [`Database`] is the
//! shipped implementation.

mod documents;
mod schema;
pub mod vectors;

pub use schema::Database;

use crate::error::Result;
use crate::search::SearchResult;
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Hash content using SHA-256
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stored document record
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    pub pages: Vec<String>,
    pub content_hash: String,
    pub page_count: u32,
    pub created_at: String,
}

/// Document summary for listings
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub id: i64,
    pub filename: String,
    pub page_count: u32,
    pub chunk_count: usize,
    pub created_at: String,
}

/// Chunk ready to persist: produced by ingestion, not yet assigned an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub chunk_index: u32,
    pub content: String,
    pub embedding: Vec<f32>,
    pub page_number: Option<u32>,
}

/// Persisted chunk
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub id: i64,
    pub document_id: i64,
    pub chunk_index: u32,
    pub content: String,
    pub embedding: Vec<f32>,
    pub page_number: Option<u32>,
}

/// Storage the ingestion and retrieval pipelines run against
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn insert_document(&self, filename: &str, pages: &[String]) -> Result<i64>;

    async fn get_document(&self, id: i64) -> Result<Option<Document>>;

    async fn list_documents(&self) -> Result<Vec<DocumentInfo>>;

    /// Returns false when no such document existed
    async fn delete_document(&self, id: i64) -> Result<bool>;

    /// Atomically swap a document's chunks for `chunks`
    async fn replace_chunks(&self, document_id: i64, chunks: &[NewChunk]) -> Result<()>;

    async fn get_chunks(&self, document_id: i64) -> Result<Vec<DocumentChunk>>;

    async fn count_chunks(&self, document_id: i64) -> Result<usize>;

    /// Closest chunks first; scores are `1 - cosine_distance`
    async fn similarity_search(
        &self,
        query: &[f32],
        top_k: usize,
        document_ids: Option<&[i64]>,
    ) -> Result<Vec<SearchResult>>;
}

impl Database {
    /// Get the default database path
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::DATA_DIR_NAME)
            .join("index.sqlite")
    }
}

// Statements are short and local, so they run inline on the calling task.
#[async_trait]
impl VectorStore for Database {
    async fn insert_document(&self, filename: &str, pages: &[String]) -> Result<i64> {
        self.create_document(filename, pages)
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        self.find_document(id)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentInfo>> {
        self.list_document_info()
    }

    async fn delete_document(&self, id: i64) -> Result<bool> {
        self.remove_document(id)
    }

    async fn replace_chunks(&self, document_id: i64, chunks: &[NewChunk]) -> Result<()> {
        self.replace_document_chunks(document_id, chunks)
    }

    async fn get_chunks(&self, document_id: i64) -> Result<Vec<DocumentChunk>> {
        self.document_chunks(document_id)
    }

    async fn count_chunks(&self, document_id: i64) -> Result<usize> {
        self.chunk_count(document_id)
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        top_k: usize,
        document_ids: Option<&[i64]>,
    ) -> Result<Vec<SearchResult>> {
        self.nearest_chunks(query, top_k, document_ids)
    }
}
