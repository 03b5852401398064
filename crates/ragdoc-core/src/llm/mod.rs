//! Language-model and embedding backends
//!
//! Every backend implements [`LanguageModelProvider`] or
//! [`EmbeddingProvider`] (or both, in separate types). Hosted APIs and
//! OpenAI-compatible local servers are reached over HTTP; Hugging Face
//! checkpoints run in-process through candle when the `local-models`
//! feature is enabled.

mod traits;

pub mod google;
pub(crate) mod http;
pub mod huggingface;
pub mod ollama;
pub mod openai;
pub mod probe;

#[cfg(feature = "local-models")]
mod candle_embedder;
#[cfg(feature = "local-models")]
mod candle_generator;
#[cfg(feature = "local-models")]
mod device;

pub use google::GoogleProvider;
pub use huggingface::{HuggingFaceEmbeddingProvider, HuggingFaceProvider};
pub use ollama::{OllamaEmbeddingProvider, OllamaProvider};
pub use openai::{OpenAICompatibleProvider, OpenAIEmbeddingProvider, OpenAIFlavor};
pub use probe::{ProbeError, ProbeResult};
pub use traits::{
    EmbeddingProvider, GenerationResult, LanguageModelProvider, Message, Role, TextStream, Usage,
};
