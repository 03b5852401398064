//! Indexing pipeline
//!
//! Page chunking, batch embedding, and persistence of documents.

mod chunker;
mod ingest;

pub use chunker::*;
pub use ingest::*;
