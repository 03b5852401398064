//! Provider registry
//!
//! Maps provider ids to constructors, separately for language models and
//! embeddings. The built-in set is registered by
//! [`ProviderRegistry::with_defaults`]; further ids can be added with
//! [`ProviderRegistry::register_llm`] / [`ProviderRegistry::register_embedding`]
//! without touching existing entries.

mod manager;

pub use manager::ProviderManager;

use crate::config::{EmbeddingConfig, LLMConfig, Settings};
use crate::error::{RagError, Result};
use crate::llm::huggingface::HF_EMBEDDING_MODELS;
use crate::llm::ollama::OLLAMA_EMBEDDING_MODELS;
use crate::llm::openai::OPENAI_EMBEDDING_MODELS;
use crate::llm::{
    EmbeddingProvider, GoogleProvider, HuggingFaceEmbeddingProvider, HuggingFaceProvider,
    LanguageModelProvider, OllamaEmbeddingProvider, OllamaProvider, OpenAICompatibleProvider,
    OpenAIEmbeddingProvider,
};
use futures::future;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// What a provider does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Llm,
    Embedding,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Llm => write!(f, "llm"),
            Capability::Embedding => write!(f, "embedding"),
        }
    }
}

impl FromStr for Capability {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "llm" => Ok(Capability::Llm),
            "embedding" | "embeddings" => Ok(Capability::Embedding),
            other => Err(RagError::InvalidInput(format!("unknown capability: {}", other))),
        }
    }
}

/// Static facts about a registered provider
#[derive(Debug, Clone, Default)]
pub struct ProviderTraits {
    /// Runs without an outbound API credential
    pub is_local: bool,
    pub requires_api_key: bool,
    /// Known model → dimension table (embedding providers)
    pub dimensions: Vec<(String, usize)>,
}

impl ProviderTraits {
    pub fn local() -> Self {
        Self {
            is_local: true,
            ..Default::default()
        }
    }

    pub fn hosted() -> Self {
        Self {
            requires_api_key: true,
            ..Default::default()
        }
    }

    pub fn with_dimensions(mut self, table: &[(&str, usize)]) -> Self {
        self.dimensions = table
            .iter()
            .map(|(name, dims)| (name.to_string(), *dims))
            .collect();
        self
    }
}

/// Introspection record for UI and API responses
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub capability: Capability,
    pub models: Vec<String>,
    pub is_local: bool,
    pub requires_api_key: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dimensions: BTreeMap<String, usize>,
}

/// Constructor for a language-model provider
pub type LlmFactory =
    Arc<dyn Fn(&LLMConfig) -> Result<Arc<dyn LanguageModelProvider>> + Send + Sync>;

/// Constructor for an embedding provider
pub type EmbeddingFactory =
    Arc<dyn Fn(&EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync>;

struct Entry<F> {
    factory: F,
    traits: ProviderTraits,
}

/// Registry of provider constructors
pub struct ProviderRegistry {
    llm: HashMap<String, Entry<LlmFactory>>,
    embedding: HashMap<String, Entry<EmbeddingFactory>>,
}

impl ProviderRegistry {
    /// Create new empty registry
    pub fn new() -> Self {
        Self {
            llm: HashMap::new(),
            embedding: HashMap::new(),
        }
    }

    /// Create registry with the built-in providers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register_llm("openai", ProviderTraits::hosted(), |c| {
            Ok(Arc::new(OpenAICompatibleProvider::openai(c)?) as Arc<dyn LanguageModelProvider>)
        });
        registry.register_llm("ollama", ProviderTraits::local(), |c| {
            Ok(Arc::new(OllamaProvider::new(c)?) as Arc<dyn LanguageModelProvider>)
        });
        registry.register_llm("lmstudio", ProviderTraits::local(), |c| {
            Ok(Arc::new(OpenAICompatibleProvider::lmstudio(c)?) as Arc<dyn LanguageModelProvider>)
        });
        registry.register_llm("huggingface", ProviderTraits::local(), |c| {
            Ok(Arc::new(HuggingFaceProvider::new(c)?) as Arc<dyn LanguageModelProvider>)
        });
        registry.register_llm("google", ProviderTraits::hosted(), |c| {
            Ok(Arc::new(GoogleProvider::new(c)?) as Arc<dyn LanguageModelProvider>)
        });
        registry.register_llm("xai", ProviderTraits::hosted(), |c| {
            Ok(Arc::new(OpenAICompatibleProvider::xai(c)?) as Arc<dyn LanguageModelProvider>)
        });

        registry.register_embedding(
            "openai",
            ProviderTraits::hosted().with_dimensions(OPENAI_EMBEDDING_MODELS),
            |c| Ok(Arc::new(OpenAIEmbeddingProvider::new(c)?) as Arc<dyn EmbeddingProvider>),
        );
        registry.register_embedding(
            "huggingface",
            ProviderTraits::local().with_dimensions(HF_EMBEDDING_MODELS),
            |c| Ok(Arc::new(HuggingFaceEmbeddingProvider::new(c)?) as Arc<dyn EmbeddingProvider>),
        );
        registry.register_embedding(
            "ollama",
            ProviderTraits::local().with_dimensions(OLLAMA_EMBEDDING_MODELS),
            |c| Ok(Arc::new(OllamaEmbeddingProvider::new(c)?) as Arc<dyn EmbeddingProvider>),
        );

        registry
    }

    /// Register (or replace) a language-model provider
    pub fn register_llm<F>(&mut self, id: impl Into<String>, traits: ProviderTraits, factory: F)
    where
        F: Fn(&LLMConfig) -> Result<Arc<dyn LanguageModelProvider>> + Send + Sync + 'static,
    {
        self.llm.insert(
            id.into(),
            Entry {
                factory: Arc::new(factory),
                traits,
            },
        );
    }

    /// Register (or replace) an embedding provider
    pub fn register_embedding<F>(
        &mut self,
        id: impl Into<String>,
        traits: ProviderTraits,
        factory: F,
    ) where
        F: Fn(&EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync + 'static,
    {
        self.embedding.insert(
            id.into(),
            Entry {
                factory: Arc::new(factory),
                traits,
            },
        );
    }

    /// Build a language-model provider for `config.provider`
    pub fn resolve_llm(&self, config: &LLMConfig) -> Result<Arc<dyn LanguageModelProvider>> {
        let entry = self.llm.get(&config.provider).ok_or_else(|| {
            RagError::Config(format!(
                "Unknown LLM provider: '{}' (available: {})",
                config.provider,
                self.ids(Capability::Llm).join(", ")
            ))
        })?;
        let provider = (entry.factory)(config)?;
        tracing::info!(
            "Created LLM provider {} (model {})",
            config.provider,
            config.model
        );
        Ok(provider)
    }

    /// Build an embedding provider for `config.provider`
    pub fn resolve_embedding(&self, config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        let entry = self.embedding.get(&config.provider).ok_or_else(|| {
            RagError::Config(format!(
                "Unknown embedding provider: '{}' (available: {})",
                config.provider,
                self.ids(Capability::Embedding).join(", ")
            ))
        })?;
        let provider = (entry.factory)(config)?;
        tracing::info!(
            "Created embedding provider {} (model {}, {} dims)",
            config.provider,
            config.model,
            provider.dimension()
        );
        Ok(provider)
    }

    /// Registered ids for a capability, sorted
    pub fn ids(&self, capability: Capability) -> Vec<String> {
        let mut ids: Vec<String> = match capability {
            Capability::Llm => self.llm.keys().cloned().collect(),
            Capability::Embedding => self.embedding.keys().cloned().collect(),
        };
        ids.sort();
        ids
    }

    fn traits(&self, capability: Capability, id: &str) -> Result<&ProviderTraits> {
        let traits = match capability {
            Capability::Llm => self.llm.get(id).map(|e| &e.traits),
            Capability::Embedding => self.embedding.get(id).map(|e| &e.traits),
        };
        traits.ok_or_else(|| RagError::Config(format!("Unknown {} provider: '{}'", capability, id)))
    }

    /// Describe a provider using built-in endpoints
    pub async fn describe(&self, capability: Capability, id: &str) -> Result<ProviderInfo> {
        self.describe_at(capability, id, None, None).await
    }

    /// Describe a provider using the endpoints and credentials in `settings`
    pub async fn describe_with(
        &self,
        capability: Capability,
        id: &str,
        settings: &Settings,
    ) -> Result<ProviderInfo> {
        self.describe_at(capability, id, settings.base_url_for(id), settings.api_key_for(id))
            .await
    }

    async fn describe_at(
        &self,
        capability: Capability,
        id: &str,
        base_url: Option<String>,
        api_key: Option<String>,
    ) -> Result<ProviderInfo> {
        let traits = self.traits(capability, id)?.clone();

        let models = match capability {
            Capability::Llm => {
                let mut config = LLMConfig::new(id, "");
                config.base_url = base_url;
                config.api_key = api_key;
                self.resolve_llm(&config)?.available_models().await
            }
            Capability::Embedding if !traits.dimensions.is_empty() => traits
                .dimensions
                .iter()
                .map(|(name, _)| name.clone())
                .collect(),
            Capability::Embedding => {
                let mut config = EmbeddingConfig::new(id, "");
                config.base_url = base_url;
                config.api_key = api_key;
                self.resolve_embedding(&config)?.available_models().await
            }
        };

        Ok(ProviderInfo {
            name: id.to_string(),
            capability,
            models,
            is_local: traits.is_local,
            requires_api_key: traits.requires_api_key,
            dimensions: traits.dimensions.into_iter().collect(),
        })
    }

    /// Describe every registered provider of a capability, sorted by id.
    ///
    /// Catalogue probes run concurrently.
    pub async fn list(&self, capability: Capability, settings: &Settings) -> Vec<ProviderInfo> {
        let ids = self.ids(capability);
        let described = future::join_all(
            ids.iter()
                .map(|id| self.describe_with(capability, id, settings)),
        )
        .await;

        ids.into_iter()
            .zip(described)
            .filter_map(|(id, result)| match result {
                Ok(info) => Some(info),
                Err(e) => {
                    tracing::warn!("Skipping {} provider {}: {}", capability, id, e);
                    None
                }
            })
            .collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(
            registry.ids(Capability::Llm),
            vec!["google", "huggingface", "lmstudio", "ollama", "openai", "xai"]
        );
        assert_eq!(
            registry.ids(Capability::Embedding),
            vec!["huggingface", "ollama", "openai"]
        );
    }

    #[test]
    fn test_every_builtin_resolves() {
        let registry = ProviderRegistry::with_defaults();
        for id in registry.ids(Capability::Llm) {
            let provider = registry.resolve_llm(&LLMConfig::new(id.as_str(), "m")).unwrap();
            assert_eq!(provider.provider_name(), id);
        }
        for id in registry.ids(Capability::Embedding) {
            let provider = registry
                .resolve_embedding(&EmbeddingConfig::new(id.as_str(), "m"))
                .unwrap();
            assert_eq!(provider.provider_name(), id);
        }
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let registry = ProviderRegistry::with_defaults();
        let err = registry
            .resolve_llm(&LLMConfig::new("anthropic-direct", "x"))
            .err()
            .unwrap();
        assert!(matches!(err, RagError::Config(_)));
        assert!(err.to_string().contains("anthropic-direct"));

        assert!(matches!(
            registry.resolve_embedding(&EmbeddingConfig::new("cohere", "x")),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn test_capability_parse() {
        assert_eq!("LLM".parse::<Capability>().unwrap(), Capability::Llm);
        assert_eq!(
            "embeddings".parse::<Capability>().unwrap(),
            Capability::Embedding
        );
        assert!("vision".parse::<Capability>().is_err());
    }

    #[tokio::test]
    async fn test_describe_flags() {
        let registry = ProviderRegistry::with_defaults();

        let openai = registry.describe(Capability::Llm, "openai").await.unwrap();
        assert!(!openai.is_local);
        assert!(openai.requires_api_key);
        assert!(openai.models.contains(&"gpt-4o-mini".to_string()));

        let hf = registry
            .describe(Capability::Embedding, "huggingface")
            .await
            .unwrap();
        assert!(hf.is_local);
        assert!(!hf.requires_api_key);
        assert_eq!(hf.dimensions["BAAI/bge-m3"], 1024);

        let ollama = registry.describe(Capability::Embedding, "ollama").await.unwrap();
        assert!(ollama.is_local);
        assert_eq!(ollama.dimensions["nomic-embed-text"], 768);

        assert!(registry.describe(Capability::Llm, "nope").await.is_err());
    }

    #[tokio::test]
    async fn test_list_keeps_id_order() {
        let registry = ProviderRegistry::with_defaults();
        let infos = registry
            .list(Capability::Embedding, &Settings::default())
            .await;

        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["huggingface", "ollama", "openai"]);
        assert!(infos.iter().all(|i| i.capability == Capability::Embedding));
        assert!(infos.iter().all(|i| !i.models.is_empty()));
    }
}
