//! Ragdoc Core Library
//!
//! Retrieval-augmented question answering over uploaded documents, with
//! interchangeable language-model and embedding backends.
//!
//! # Features
//! - One contract over hosted APIs, OpenAI-compatible local servers and
//!   in-process Hugging Face checkpoints (`local-models` feature)
//! - Provider registry plus a hot-swapping provider manager
//! - Overlapping character chunking with batch embedding
//! - SQLite storage ranked by an in-database cosine distance
//! - Grounded chat, one-shot or streamed

pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod llm;
pub mod providers;
pub mod search;

pub use config::{EmbeddingConfig, LLMConfig, Settings};
pub use db::{Database, Document, DocumentChunk, DocumentInfo, NewChunk, VectorStore};
pub use error::{Error, RagError, Result};
pub use index::{chunk_by_chars, chunk_pages, ingest, Chunk, ChunkWindow, IndexService, ReindexReport};
pub use llm::{
    EmbeddingProvider, GenerationResult, LanguageModelProvider, Message, Role, TextStream, Usage,
};
pub use providers::{Capability, ProviderInfo, ProviderManager, ProviderRegistry, ProviderTraits};
pub use search::{build_messages, ChatResponse, RagService, SearchResult};

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "ragdoc";

/// Default data directory name (database lives here)
pub const DATA_DIR_NAME: &str = "ragdoc";
