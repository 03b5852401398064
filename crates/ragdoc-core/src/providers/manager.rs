//! Cached, hot-swappable provider instances

use super::ProviderRegistry;
use crate::config::{EmbeddingConfig, LLMConfig, Settings};
use crate::error::Result;
use crate::llm::{EmbeddingProvider, LanguageModelProvider};
use std::sync::{Arc, Mutex, MutexGuard};

/// One cached instance and the config it was built from
struct Slot<C, P: ?Sized> {
    config: C,
    provider: Arc<P>,
}

type LlmSlot = Option<Slot<LLMConfig, dyn LanguageModelProvider>>;
type EmbeddingSlot = Option<Slot<EmbeddingConfig, dyn EmbeddingProvider>>;

/// Holds at most one live provider per capability.
///
/// Each `llm`/`embedding` call derives a config from the settings it is
/// given and compares it with the config of the cached instance. When they
/// differ (or nothing is cached) a new instance replaces the old one.
/// Callers that already hold the old `Arc` keep using it until they drop it.
///
/// The compare-and-construct runs under the slot's lock, so concurrent
/// callers observing the same configuration change construct exactly one
/// instance. Construction is cheap for every provider (local weights load in
/// `ensure_ready`, not here), so holding the lock across it is fine.
pub struct ProviderManager {
    registry: ProviderRegistry,
    llm: Mutex<LlmSlot>,
    embedding: Mutex<EmbeddingSlot>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic inside a factory leaves the slot either old or empty; both are valid.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ProviderManager {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            llm: Mutex::new(None),
            embedding: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Active language-model provider for the current settings
    pub fn llm(&self, settings: &Settings) -> Result<Arc<dyn LanguageModelProvider>> {
        let config = settings.llm_config();
        let mut slot = lock(&self.llm);

        if let Some(cached) = slot.as_ref() {
            if cached.config == config {
                return Ok(cached.provider.clone());
            }
            tracing::info!(
                "LLM configuration changed ({} {} -> {} {}), replacing provider",
                cached.config.provider,
                cached.config.model,
                config.provider,
                config.model
            );
        }

        let provider = self.registry.resolve_llm(&config)?;
        *slot = Some(Slot {
            config,
            provider: provider.clone(),
        });
        Ok(provider)
    }

    /// Active embedding provider for the current settings
    pub fn embedding(&self, settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
        let config = settings.embedding_config();
        let mut slot = lock(&self.embedding);

        if let Some(cached) = slot.as_ref() {
            if cached.config == config {
                return Ok(cached.provider.clone());
            }
            tracing::info!(
                "Embedding configuration changed ({} {} -> {} {}), replacing provider",
                cached.config.provider,
                cached.config.model,
                config.provider,
                config.model
            );
        }

        let provider = self.registry.resolve_embedding(&config)?;
        *slot = Some(Slot {
            config,
            provider: provider.clone(),
        });
        Ok(provider)
    }

    /// Drop the cached language-model provider
    pub fn update_llm(&self) {
        *lock(&self.llm) = None;
    }

    /// Drop the cached embedding provider
    pub fn update_embedding(&self) {
        *lock(&self.embedding) = None;
    }

    /// Drop every cached provider
    pub fn reset(&self) {
        self.update_llm();
        self.update_embedding();
    }
}

impl Default for ProviderManager {
    fn default() -> Self {
        Self::new(ProviderRegistry::with_defaults())
    }
}
