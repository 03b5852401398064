//! Retrieval and answer generation
//!
//! Provides:
//! - Vector similarity search over stored chunks
//! - Grounded chat: retrieve, assemble context, generate (one-shot or streamed)

mod prompt;

pub use prompt::{build_context, build_messages, CONTEXT_DELIMITER, SYSTEM_PROMPT};

use crate::config::Settings;
use crate::db::VectorStore;
use crate::error::{RagError, Result};
use crate::llm::{EmbeddingProvider, LanguageModelProvider, TextStream};
use crate::providers::ProviderManager;
use serde::Serialize;
use std::sync::Arc;

/// One retrieval hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub chunk_id: i64,
    pub document_id: i64,
    /// Display name of the parent document
    pub filename: String,
    pub content: String,
    pub page_number: Option<u32>,
    /// Cosine similarity, closest first
    pub score: f64,
}

/// Answer plus the results it was grounded on
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<SearchResult>,
}

/// Query-time pipeline over a store and the active providers.
///
/// Holds no state of its own. Failures from the store or either provider
/// propagate unchanged.
#[derive(Clone)]
pub struct RagService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModelProvider>,
}

impl RagService {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModelProvider>,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
        }
    }

    /// Wire the providers currently selected by `settings`
    pub fn from_manager(
        manager: &ProviderManager,
        settings: &Settings,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        Ok(Self::new(
            store,
            manager.embedding(settings)?,
            manager.llm(settings)?,
        ))
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn llm(&self) -> &Arc<dyn LanguageModelProvider> {
        &self.llm
    }

    /// Closest chunks to `query`, in the store's order
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        document_ids: Option<&[i64]>,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidInput("query must not be empty".into()));
        }

        self.embedder.ensure_ready().await?;
        let vector = self.embedder.embed_query(query).await?;
        tracing::debug!(
            "Searching with {}-dimensional query vector (top_k = {})",
            vector.len(),
            top_k
        );
        self.store.similarity_search(&vector, top_k, document_ids).await
    }

    /// Retrieve context and generate a grounded answer
    pub async fn chat(
        &self,
        query: &str,
        top_k: usize,
        document_ids: Option<&[i64]>,
    ) -> Result<ChatResponse> {
        let sources = self.search(query, top_k, document_ids).await?;
        let messages = build_messages(query, &sources);

        self.llm.ensure_ready().await?;
        let result = self.llm.generate(&messages).await?;

        Ok(ChatResponse {
            answer: result.text,
            sources,
        })
    }

    /// Like [`chat`](Self::chat) but streams the answer.
    ///
    /// Sources are returned up front so they can be shown before the first
    /// fragment arrives.
    pub async fn chat_stream(
        &self,
        query: &str,
        top_k: usize,
        document_ids: Option<&[i64]>,
    ) -> Result<(TextStream, Vec<SearchResult>)> {
        let sources = self.search(query, top_k, document_ids).await?;
        let messages = build_messages(query, &sources);

        self.llm.ensure_ready().await?;
        let stream = self.llm.generate_stream(&messages).await?;
        Ok((stream, sources))
    }
}
