//! Capability traits implemented by every backend

use crate::error::{RagError, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Incremental text fragments of a streamed generation.
///
/// Fragments arrive in emission order. The stream ends when the backend
/// signals completion; dropping it early cancels the request and releases
/// the connection.
pub type TextStream = BoxStream<'static, Result<String>>;

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of a conversation sent to a language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Token accounting reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A completed language-model response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    /// Model name the backend reports having used
    pub model: String,
    pub usage: Option<Usage>,
}

/// Language-model backend
#[async_trait]
pub trait LanguageModelProvider: Send + Sync {
    /// One-shot completion
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult>;

    /// Streamed completion
    async fn generate_stream(&self, messages: &[Message]) -> Result<TextStream>;

    /// Best-effort model catalogue; never fails
    async fn available_models(&self) -> Vec<String>;

    /// Liveness probe; never fails
    async fn health_check(&self) -> bool;

    /// Load anything expensive the backend needs. Idempotent.
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// Registry id of this backend
    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;
}

/// Embedding backend
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single string; the result has `dimension()` elements
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch; output `i` belongs to input `i`
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Best-effort model catalogue; never fails
    async fn available_models(&self) -> Vec<String>;

    /// Liveness probe; never fails
    async fn health_check(&self) -> bool;

    /// Load anything expensive the backend needs. Idempotent.
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// Vector length produced by this backend
    fn dimension(&self) -> usize;

    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;
}

/// Reject any vector whose length differs from the declared `dimension`
pub(crate) fn check_dimensions(
    provider: &str,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>> {
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dimension) {
        return Err(RagError::provider(
            provider,
            format!(
                "embedding {} has {} dimensions, expected {}",
                i,
                v.len(),
                dimension
            ),
        ));
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dimensions() {
        let ok = check_dimensions("test", 2, vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(ok.len(), 2);
        assert!(check_dimensions("test", 2, Vec::new()).unwrap().is_empty());

        match check_dimensions("test", 2, vec![vec![1.0, 0.0], vec![1.0]]) {
            Err(RagError::Provider { provider, message }) => {
                assert_eq!(provider, "test");
                assert!(message.contains("embedding 1 has 1 dimensions, expected 2"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
