//! Locally-loaded Hugging Face models
//!
//! Construction only records configuration. Weights are located in the local
//! Hugging Face cache and loaded by `ensure_ready`, once per instance, on a
//! blocking worker; the outcome (including failure) is memoised. Inference
//! also runs on the blocking pool so the async scheduler is never stalled.
//!
//! The candle runtime is compiled only with the `local-models` feature.
//! Without it these providers still construct and report `health_check() ==
//! false`, and every call that needs the model fails with
//! [`RagError::MissingCapability`].

use super::traits::{
    EmbeddingProvider, GenerationResult, LanguageModelProvider, Message, Role, TextStream,
};
use crate::config::{EmbeddingConfig, LLMConfig};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};

#[cfg(feature = "local-models")]
use super::candle_embedder::CandleEmbedder;
#[cfg(feature = "local-models")]
use super::traits::check_dimensions;
#[cfg(feature = "local-models")]
use super::candle_generator::CandleGenerator;
#[cfg(feature = "local-models")]
use std::sync::Arc;
#[cfg(feature = "local-models")]
use tokio::sync::OnceCell;

/// Corrective hint attached to missing-runtime errors
pub const LOCAL_MODELS_HINT: &str =
    "local model runtime not compiled in; rebuild with --features local-models";

/// Default `max_new_tokens` when the config leaves it unset
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 512;

/// Llama-architecture checkpoints the local generator can load
pub const HF_LLM_MODELS: &[&str] = &[
    "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
    "HuggingFaceTB/SmolLM2-1.7B-Instruct",
    "meta-llama/Llama-2-7b-chat-hf",
];

/// Known sentence-encoder checkpoints and their dimensions
pub const HF_EMBEDDING_MODELS: &[(&str, usize)] = &[
    ("sentence-transformers/all-MiniLM-L6-v2", 384),
    ("sentence-transformers/all-mpnet-base-v2", 768),
    ("sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2", 384),
    ("BAAI/bge-small-en-v1.5", 384),
    ("BAAI/bge-base-en-v1.5", 768),
    ("BAAI/bge-large-en-v1.5", 1024),
    ("BAAI/bge-m3", 1024),
    ("intfloat/multilingual-e5-small", 384),
    ("intfloat/multilingual-e5-base", 768),
    ("intfloat/multilingual-e5-large", 1024),
    ("jhgan/ko-sroberta-multitask", 768),
];

pub fn hf_embedding_dimension(model: &str) -> Option<usize> {
    HF_EMBEDDING_MODELS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, dims)| *dims)
}

/// Whether the candle runtime was compiled into this build
pub fn local_runtime_available() -> bool {
    cfg!(feature = "local-models")
}

#[cfg_attr(feature = "local-models", allow(dead_code))]
fn missing_runtime() -> RagError {
    RagError::MissingCapability {
        provider: "huggingface".to_string(),
        hint: LOCAL_MODELS_HINT.to_string(),
    }
}

/// Default root of the Hugging Face hub cache
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("huggingface").join("hub"))
}

/// Locate a downloaded snapshot of `model` in a hub-layout cache.
///
/// `org/name` lives under `models--org--name/snapshots/<revision>/`. A
/// revision named by `refs/main` wins; otherwise the first snapshot found.
pub fn resolve_snapshot(model: &str, cache_dir: Option<&Path>) -> Result<PathBuf> {
    let root = match cache_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_cache_dir()
            .ok_or_else(|| RagError::Config("Cannot determine cache directory".to_string()))?,
    };

    let model_root = root.join(format!("models--{}", model.replace('/', "--")));
    let snapshots = model_root.join("snapshots");

    if let Ok(revision) = std::fs::read_to_string(model_root.join("refs").join("main")) {
        let pinned = snapshots.join(revision.trim());
        if pinned.is_dir() {
            return Ok(pinned);
        }
    }

    if let Ok(entries) = std::fs::read_dir(&snapshots) {
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        if let Some(first) = dirs.into_iter().next() {
            return Ok(first);
        }
    }

    Err(RagError::ModelNotFound(format!(
        "{} is not in the local cache; expected a snapshot under {}",
        model,
        snapshots.display()
    )))
}

/// Flatten a conversation into the plain-text prompt the local models expect
pub fn format_prompt(messages: &[Message]) -> String {
    let mut parts: Vec<String> = messages
        .iter()
        .map(|m| {
            let label = match m.role {
                Role::System => "System",
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{}: {}", label, m.content)
        })
        .collect();
    parts.push("Assistant:".to_string());
    parts.join("\n\n")
}

/// Local causal language model
pub struct HuggingFaceProvider {
    model: String,
    #[cfg_attr(not(feature = "local-models"), allow(dead_code))]
    temperature: f32,
    max_new_tokens: u32,
    cache_dir: Option<PathBuf>,
    #[cfg(feature = "local-models")]
    loaded: OnceCell<std::result::Result<Arc<CandleGenerator>, String>>,
}

impl HuggingFaceProvider {
    pub fn new(config: &LLMConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_new_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_NEW_TOKENS),
            cache_dir: config.cache_dir.clone(),
            #[cfg(feature = "local-models")]
            loaded: OnceCell::new(),
        })
    }

    pub fn max_new_tokens(&self) -> u32 {
        self.max_new_tokens
    }

    /// Snapshot directory the weights load from
    pub fn model_dir(&self) -> Result<PathBuf> {
        resolve_snapshot(&self.model, self.cache_dir.as_deref())
    }

    #[cfg(feature = "local-models")]
    fn generator(&self) -> Result<Arc<CandleGenerator>> {
        match self.loaded.get() {
            Some(Ok(generator)) => Ok(generator.clone()),
            Some(Err(e)) => Err(RagError::provider("huggingface", e.clone())),
            None => Err(RagError::NotReady(format!(
                "{} is not loaded; call ensure_ready first",
                self.model
            ))),
        }
    }
}

#[async_trait]
impl LanguageModelProvider for HuggingFaceProvider {
    #[cfg(feature = "local-models")]
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult> {
        let generator = self.generator()?;
        let prompt = format_prompt(messages);
        let max_new_tokens = self.max_new_tokens as usize;
        let temperature = self.temperature;

        let generated = tokio::task::spawn_blocking(move || {
            generator.generate(&prompt, max_new_tokens, temperature)
        })
        .await
        .map_err(|e| RagError::provider("huggingface", format!("inference task failed: {}", e)))??;

        Ok(GenerationResult {
            text: generated.text,
            model: self.model.clone(),
            usage: Some(super::traits::Usage {
                prompt_tokens: generated.prompt_tokens,
                completion_tokens: generated.completion_tokens,
                total_tokens: generated.prompt_tokens + generated.completion_tokens,
            }),
        })
    }

    #[cfg(not(feature = "local-models"))]
    async fn generate(&self, _messages: &[Message]) -> Result<GenerationResult> {
        Err(missing_runtime())
    }

    /// Local inference is not incremental: the whole answer arrives as one fragment
    async fn generate_stream(&self, messages: &[Message]) -> Result<TextStream> {
        let result = self.generate(messages).await?;
        Ok(futures::stream::once(async move { Ok(result.text) }).boxed())
    }

    async fn available_models(&self) -> Vec<String> {
        HF_LLM_MODELS.iter().map(|m| m.to_string()).collect()
    }

    async fn health_check(&self) -> bool {
        local_runtime_available()
    }

    #[cfg(feature = "local-models")]
    async fn ensure_ready(&self) -> Result<()> {
        let outcome = self
            .loaded
            .get_or_init(|| async {
                tracing::info!("Loading local language model {}", self.model);
                let dir = self.model_dir();
                let loaded = tokio::task::spawn_blocking(move || CandleGenerator::load(&dir?))
                .await;
                match loaded {
                    Ok(Ok(generator)) => Ok(Arc::new(generator)),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(e) => Err(format!("model loading task failed: {}", e)),
                }
            })
            .await;
        outcome
            .as_ref()
            .map(|_| ())
            .map_err(|e| RagError::provider("huggingface", e.clone()))
    }

    #[cfg(not(feature = "local-models"))]
    async fn ensure_ready(&self) -> Result<()> {
        Err(missing_runtime())
    }

    fn provider_name(&self) -> &str {
        "huggingface"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Local sentence encoder
pub struct HuggingFaceEmbeddingProvider {
    model: String,
    dimension: usize,
    cache_dir: Option<PathBuf>,
    #[cfg(feature = "local-models")]
    loaded: OnceCell<std::result::Result<Arc<CandleEmbedder>, String>>,
}

impl HuggingFaceEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            dimension: hf_embedding_dimension(&config.model).unwrap_or(config.dimension),
            cache_dir: config.cache_dir.clone(),
            #[cfg(feature = "local-models")]
            loaded: OnceCell::new(),
        })
    }

    /// Snapshot directory the weights load from
    pub fn model_dir(&self) -> Result<PathBuf> {
        resolve_snapshot(&self.model, self.cache_dir.as_deref())
    }

    #[cfg(feature = "local-models")]
    fn encoder(&self) -> Result<Arc<CandleEmbedder>> {
        match self.loaded.get() {
            Some(Ok(encoder)) => Ok(encoder.clone()),
            Some(Err(e)) => Err(RagError::provider("huggingface", e.clone())),
            None => Err(RagError::NotReady(format!(
                "{} is not loaded; call ensure_ready first",
                self.model
            ))),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbeddingProvider {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::provider("huggingface", "no embedding returned"))
    }

    #[cfg(feature = "local-models")]
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let encoder = self.encoder()?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let texts = texts.to_vec();
        let vectors = tokio::task::spawn_blocking(move || encoder.embed_batch(&texts))
            .await
            .map_err(|e| RagError::provider("huggingface", format!("inference task failed: {}", e)))??;
        check_dimensions("huggingface", self.dimension, vectors)
    }

    #[cfg(not(feature = "local-models"))]
    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(missing_runtime())
    }

    async fn available_models(&self) -> Vec<String> {
        HF_EMBEDDING_MODELS
            .iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    async fn health_check(&self) -> bool {
        local_runtime_available()
    }

    #[cfg(feature = "local-models")]
    async fn ensure_ready(&self) -> Result<()> {
        let outcome = self
            .loaded
            .get_or_init(|| async {
                tracing::info!("Loading local embedding model {}", self.model);
                let dir = self.model_dir();
                let loaded = tokio::task::spawn_blocking(move || CandleEmbedder::load(&dir?))
                .await;
                match loaded {
                    Ok(Ok(encoder)) => Ok(Arc::new(encoder)),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(e) => Err(format!("model loading task failed: {}", e)),
                }
            })
            .await;
        outcome
            .as_ref()
            .map(|_| ())
            .map_err(|e| RagError::provider("huggingface", e.clone()))
    }

    #[cfg(not(feature = "local-models"))]
    async fn ensure_ready(&self) -> Result<()> {
        Err(missing_runtime())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "huggingface"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
