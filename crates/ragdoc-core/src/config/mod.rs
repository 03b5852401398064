//! Configuration management
//!
//! [`Settings`] is the live settings source. It is read every time the
//! provider manager is asked for a backend, so edits made between calls
//! (or a reloaded file) take effect on the next request.

mod provider;

pub use provider::{
    EmbeddingConfig, LLMConfig, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_TEMPERATURE,
};

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default chunk window in characters
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive chunks in characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Default number of retrieved chunks
pub const DEFAULT_TOP_K: usize = 5;

/// Default Ollama endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default LM Studio endpoint (OpenAI-compatible)
pub const DEFAULT_LMSTUDIO_URL: &str = "http://localhost:1234/v1";

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Language-model provider id (openai, ollama, lmstudio, huggingface, google, xai)
    pub llm_provider: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: Option<u32>,

    /// Embedding provider id (openai, ollama, huggingface)
    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,

    pub openai_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub xai_api_key: Option<String>,
    pub ollama_base_url: String,
    pub lmstudio_base_url: String,

    /// Override for the local weight cache (defaults to ~/.cache/huggingface/hub)
    pub huggingface_cache_dir: Option<PathBuf>,

    pub database_path: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_provider: env_or("RAGDOC_LLM_PROVIDER", "openai"),
            llm_model: env_or("RAGDOC_LLM_MODEL", "gpt-4o-mini"),
            llm_temperature: std::env::var("RAGDOC_LLM_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TEMPERATURE),
            llm_max_tokens: std::env::var("RAGDOC_LLM_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok()),
            embedding_provider: env_or("RAGDOC_EMBEDDING_PROVIDER", "openai"),
            embedding_model: env_or("RAGDOC_EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_dimension: std::env::var("RAGDOC_EMBEDDING_DIMENSION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSION),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            google_api_key: std::env::var("GOOGLE_API_KEY").ok(),
            xai_api_key: std::env::var("XAI_API_KEY").ok(),
            ollama_base_url: env_or("OLLAMA_BASE_URL", DEFAULT_OLLAMA_URL),
            lmstudio_base_url: env_or("LMSTUDIO_BASE_URL", DEFAULT_LMSTUDIO_URL),
            huggingface_cache_dir: std::env::var("RAGDOC_HF_CACHE").ok().map(PathBuf::from),
            database_path: std::env::var("RAGDOC_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_database_path()),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn default_database_path() -> PathBuf {
    crate::db::Database::default_path()
}

impl Settings {
    /// Load settings from the default path, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load settings from a YAML file; a missing file yields defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        } else {
            Settings::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::default_path())
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be positive".to_string()));
        }
        Ok(())
    }

    /// Credential for a provider id, if that provider takes one
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        match provider {
            "openai" => self.openai_api_key.clone(),
            "google" => self.google_api_key.clone(),
            "xai" => self.xai_api_key.clone(),
            _ => None,
        }
    }

    /// Endpoint override for a provider id, if that provider has one
    pub fn base_url_for(&self, provider: &str) -> Option<String> {
        match provider {
            "ollama" => Some(self.ollama_base_url.clone()),
            "lmstudio" => Some(self.lmstudio_base_url.clone()),
            _ => None,
        }
    }

    /// Language-model selection derived from the current settings
    pub fn llm_config(&self) -> LLMConfig {
        LLMConfig {
            provider: self.llm_provider.clone(),
            model: self.llm_model.clone(),
            temperature: self.llm_temperature,
            max_tokens: self.llm_max_tokens,
            api_key: self.api_key_for(&self.llm_provider),
            base_url: self.base_url_for(&self.llm_provider),
            cache_dir: self.huggingface_cache_dir.clone(),
        }
    }

    /// Embedding selection derived from the current settings
    pub fn embedding_config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: self.embedding_provider.clone(),
            model: self.embedding_model.clone(),
            dimension: self.embedding_dimension,
            api_key: self.api_key_for(&self.embedding_provider),
            base_url: self.base_url_for(&self.embedding_provider),
            cache_dir: self.huggingface_cache_dir.clone(),
        }
    }
}
