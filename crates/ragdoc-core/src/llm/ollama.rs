//! Ollama backends (`/api/chat`, `/api/embeddings`)

use super::http::{
    build_client, check_status, join_url, line_stream, EMBED_TIMEOUT, GENERATE_TIMEOUT,
    PROBE_TIMEOUT,
};
use super::probe::{self, ProbeResult};
use super::traits::{
    check_dimensions, EmbeddingProvider, GenerationResult, LanguageModelProvider, Message, TextStream, Usage,
};
use crate::config::{EmbeddingConfig, LLMConfig, DEFAULT_OLLAMA_URL};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use futures::{future, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

/// Offered when `/api/tags` cannot be read
pub const OLLAMA_DEFAULT_MODELS: &[&str] = &[
    "llama2",
    "llama3",
    "llama3.2",
    "mistral",
    "mixtral",
    "codellama",
    "phi",
    "gemma",
    "qwen",
    "qwen2.5",
];

/// Known Ollama embedding models and their dimensions
pub const OLLAMA_EMBEDDING_MODELS: &[(&str, usize)] = &[
    ("nomic-embed-text", 768),
    ("mxbai-embed-large", 1024),
    ("all-minilm", 384),
    ("snowflake-arctic-embed", 1024),
];

#[derive(Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

/// Names of the models pulled into an Ollama server
async fn fetch_tags(http: &reqwest::Client, base_url: &str) -> ProbeResult<Vec<String>> {
    let response = http
        .get(join_url(base_url, "api/tags"))
        .timeout(PROBE_TIMEOUT)
        .send()
        .await?;
    let tags: TagList = probe::expect_success(response)?.json().await?;
    Ok(tags.models.into_iter().map(|m| m.name).collect())
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<ReplyMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

/// Chat completions against a local Ollama server
pub struct OllamaProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OllamaProvider {
    pub fn new(config: &LLMConfig) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn chat_request(&self, messages: &[Message], stream: bool) -> reqwest::RequestBuilder {
        self.http
            .post(join_url(&self.base_url, "api/chat"))
            .json(&ChatRequest {
                model: &self.model,
                messages,
                stream,
                options: ChatOptions {
                    temperature: self.temperature,
                    num_predict: self.max_tokens,
                },
            })
    }
}

#[async_trait]
impl LanguageModelProvider for OllamaProvider {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult> {
        tracing::debug!("ollama chat: model={} messages={}", self.model, messages.len());
        let response = self
            .chat_request(messages, false)
            .timeout(GENERATE_TIMEOUT)
            .send()
            .await?;
        let reply: ChatReply = check_status("ollama", response).await?.json().await?;

        if let Some(error) = reply.error {
            return Err(RagError::provider("ollama", error));
        }

        let usage = match (reply.prompt_eval_count, reply.eval_count) {
            (Some(prompt), Some(completion)) => Some(Usage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
            }),
            _ => None,
        };

        Ok(GenerationResult {
            text: reply.message.map(|m| m.content).unwrap_or_default(),
            model: reply.model.unwrap_or_else(|| self.model.clone()),
            usage,
        })
    }

    async fn generate_stream(&self, messages: &[Message]) -> Result<TextStream> {
        let response = self.chat_request(messages, true).send().await?;
        let response = check_status("ollama", response).await?;

        // One JSON object per line; the final object carries `done: true`.
        let fragments = line_stream("ollama", response)
            .try_filter(|line| future::ready(!line.trim().is_empty()))
            .and_then(|line| {
                future::ready(
                    serde_json::from_str::<ChatReply>(&line)
                        .map_err(|e| RagError::provider("ollama", format!("bad stream line: {}", e))),
                )
            })
            .and_then(|reply| match reply.error {
                Some(error) => future::ready(Err(RagError::provider("ollama", error))),
                None => future::ready(Ok(reply)),
            })
            .try_take_while(|reply| future::ready(Ok(!reply.done)))
            .try_filter_map(|reply| {
                future::ready(Ok(reply
                    .message
                    .map(|m| m.content)
                    .filter(|content| !content.is_empty())))
            });

        Ok(fragments.boxed())
    }

    async fn available_models(&self) -> Vec<String> {
        probe::models_or(
            "ollama",
            fetch_tags(&self.http, &self.base_url).await,
            || OLLAMA_DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        )
    }

    async fn health_check(&self) -> bool {
        let probe = fetch_tags(&self.http, &self.base_url).await.map(|_| ());
        probe::healthy("ollama", probe)
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Look up a known Ollama embedding dimension, ignoring a `:tag` suffix
pub fn ollama_embedding_dimension(model: &str) -> Option<usize> {
    let base = model.split(':').next().unwrap_or(model);
    OLLAMA_EMBEDDING_MODELS
        .iter()
        .find(|(name, _)| *name == base)
        .map(|(_, dims)| *dims)
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedReply {
    embedding: Vec<f32>,
}

/// Embeddings from a local Ollama server.
///
/// The endpoint embeds one prompt per request, so batches fan out into
/// concurrent requests whose results are gathered back in input order.
pub struct OllamaEmbeddingProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl OllamaEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model: config.model.clone(),
            dimension: ollama_embedding_dimension(&config.model).unwrap_or(config.dimension),
        })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .http
            .post(join_url(&self.base_url, "api/embeddings"))
            .json(&EmbedRequest {
                model: &self.model,
                prompt: text,
            })
            .timeout(EMBED_TIMEOUT)
            .send()
            .await?;
        let reply: EmbedReply = check_status("ollama", response).await?.json().await?;
        let mut checked = check_dimensions("ollama", self.dimension, vec![reply.embedding])?;
        Ok(checked.remove(0))
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text).await
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tracing::debug!("ollama embedding batch of {} texts", texts.len());
        // try_join_all yields outputs in the order the futures were given
        future::try_join_all(texts.iter().map(|text| self.embed_one(text))).await
    }

    async fn available_models(&self) -> Vec<String> {
        let probe = fetch_tags(&self.http, &self.base_url).await.map(|names| {
            names
                .into_iter()
                .filter(|name| name.to_lowercase().contains("embed"))
                .collect()
        });
        probe::models_or("ollama", probe, || {
            OLLAMA_EMBEDDING_MODELS
                .iter()
                .map(|(name, _)| name.to_string())
                .collect()
        })
    }

    async fn health_check(&self) -> bool {
        let probe = fetch_tags(&self.http, &self.base_url).await.map(|_| ());
        probe::healthy("ollama", probe)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
