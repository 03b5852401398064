//! Provider selection value objects
//!
//! Both types are compared by value: the provider manager rebuilds a cached
//! backend whenever the config derived from settings stops being equal to the
//! one the cached instance was built from.

use std::path::PathBuf;

/// Default sampling temperature for language models
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default embedding dimension (OpenAI text-embedding-3-small)
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Selection of a language-model backend
#[derive(Debug, Clone, PartialEq)]
pub struct LLMConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Root of locally cached weights (Hugging Face hub layout)
    pub cache_dir: Option<PathBuf>,
}

impl LLMConfig {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            api_key: None,
            base_url: None,
            cache_dir: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self::new("openai", "gpt-4o-mini")
    }
}

/// Selection of an embedding backend
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    /// Vector length; providers with a known model table override this
    pub dimension: usize,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub cache_dir: Option<PathBuf>,
}

impl EmbeddingConfig {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            api_key: None,
            base_url: None,
            cache_dir: None,
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::new("openai", "text-embedding-3-small")
    }
}
