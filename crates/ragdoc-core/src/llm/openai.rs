//! OpenAI and OpenAI-compatible backends (LM Studio, xAI)

use super::http::{
    build_client, check_status, join_url, sse_data, EMBED_TIMEOUT, GENERATE_TIMEOUT,
    PROBE_TIMEOUT,
};
use super::probe::{self, ProbeError, ProbeResult};
use super::traits::{
    check_dimensions, EmbeddingProvider, GenerationResult, LanguageModelProvider, Message,
    TextStream, Usage,
};
use crate::config::{EmbeddingConfig, LLMConfig, DEFAULT_LMSTUDIO_URL};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use futures::{future, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const XAI_BASE_URL: &str = "https://api.x.ai/v1";

/// LM Studio ignores the key but its server expects the header
const LMSTUDIO_PLACEHOLDER_KEY: &str = "lm-studio";

pub const OPENAI_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4-turbo",
    "gpt-4",
    "gpt-3.5-turbo",
];

pub const XAI_MODELS: &[&str] = &["grok-beta", "grok-2", "grok-2-mini"];

/// Known OpenAI embedding models and their dimensions
pub const OPENAI_EMBEDDING_MODELS: &[(&str, usize)] = &[
    ("text-embedding-3-small", 1536),
    ("text-embedding-3-large", 3072),
    ("text-embedding-ada-002", 1536),
];

/// Which server speaks the OpenAI chat protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIFlavor {
    OpenAI,
    LmStudio,
    Xai,
}

impl OpenAIFlavor {
    pub fn id(&self) -> &'static str {
        match self {
            OpenAIFlavor::OpenAI => "openai",
            OpenAIFlavor::LmStudio => "lmstudio",
            OpenAIFlavor::Xai => "xai",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            OpenAIFlavor::OpenAI => OPENAI_BASE_URL,
            OpenAIFlavor::LmStudio => DEFAULT_LMSTUDIO_URL,
            OpenAIFlavor::Xai => XAI_BASE_URL,
        }
    }

    fn requires_api_key(&self) -> bool {
        !matches!(self, OpenAIFlavor::LmStudio)
    }

    fn key_variable(&self) -> &'static str {
        match self {
            OpenAIFlavor::Xai => "XAI_API_KEY",
            _ => "OPENAI_API_KEY",
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// Chat client for any server implementing `/chat/completions`
pub struct OpenAICompatibleProvider {
    flavor: OpenAIFlavor,
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAICompatibleProvider {
    pub fn new(flavor: OpenAIFlavor, config: &LLMConfig) -> Result<Self> {
        let api_key = match flavor {
            OpenAIFlavor::LmStudio => Some(
                config
                    .api_key
                    .clone()
                    .unwrap_or_else(|| LMSTUDIO_PLACEHOLDER_KEY.to_string()),
            ),
            _ => config.api_key.clone().filter(|k| !k.is_empty()),
        };

        Ok(Self {
            flavor,
            http: build_client()?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| flavor.default_base_url().to_string()),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn openai(config: &LLMConfig) -> Result<Self> {
        Self::new(OpenAIFlavor::OpenAI, config)
    }

    pub fn lmstudio(config: &LLMConfig) -> Result<Self> {
        Self::new(OpenAIFlavor::LmStudio, config)
    }

    pub fn xai(config: &LLMConfig) -> Result<Self> {
        Self::new(OpenAIFlavor::Xai, config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_request(
        &self,
        messages: &[Message],
        max_tokens: Option<u32>,
        stream: bool,
    ) -> Result<reqwest::RequestBuilder> {
        if self.flavor.requires_api_key() && self.api_key.is_none() {
            return Err(RagError::Config(format!(
                "{} requires an API key (set {})",
                self.flavor.id(),
                self.flavor.key_variable()
            )));
        }

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens,
            stream,
        };

        let mut req = self
            .http
            .post(join_url(&self.base_url, "chat/completions"))
            .json(&request);
        if let Some(ref api_key) = self.api_key {
            req = req.bearer_auth(api_key);
        }
        Ok(req)
    }

    async fn complete(
        &self,
        messages: &[Message],
        max_tokens: Option<u32>,
        timeout: Duration,
    ) -> Result<GenerationResult> {
        let response = self
            .chat_request(messages, max_tokens, false)?
            .timeout(timeout)
            .send()
            .await?;
        let response = check_status(self.flavor.id(), response).await?;
        let body: ChatResponse = response.json().await?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RagError::provider(self.flavor.id(), "response contained no choices"))?;

        Ok(GenerationResult {
            text,
            model: body.model.unwrap_or_else(|| self.model.clone()),
            usage: body.usage,
        })
    }

    async fn fetch_models(&self) -> ProbeResult<Vec<String>> {
        let mut req = self
            .http
            .get(join_url(&self.base_url, "models"))
            .timeout(PROBE_TIMEOUT);
        if let Some(ref api_key) = self.api_key {
            req = req.bearer_auth(api_key);
        }
        let response = probe::expect_success(req.send().await?)?;
        let list: ModelList = response.json().await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    async fn probe_health(&self) -> ProbeResult<()> {
        match self.flavor {
            OpenAIFlavor::LmStudio => self.fetch_models().await.map(|_| ()),
            _ => self
                .complete(&[Message::user("hi")], Some(1), PROBE_TIMEOUT)
                .await
                .map(|_| ())
                .map_err(|e| ProbeError::Unavailable(e.to_string())),
        }
    }
}

#[async_trait]
impl LanguageModelProvider for OpenAICompatibleProvider {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult> {
        tracing::debug!(
            "{} chat completion: model={} messages={}",
            self.flavor.id(),
            self.model,
            messages.len()
        );
        self.complete(messages, self.max_tokens, GENERATE_TIMEOUT)
            .await
    }

    async fn generate_stream(&self, messages: &[Message]) -> Result<TextStream> {
        let response = self
            .chat_request(messages, self.max_tokens, true)?
            .send()
            .await?;
        let provider = self.flavor.id();
        let response = check_status(provider, response).await?;

        let fragments = sse_data(provider, response).try_filter_map(move |data| {
            let parsed = serde_json::from_str::<StreamChunk>(&data)
                .map_err(|e| RagError::provider(provider, format!("bad stream chunk: {}", e)))
                .map(|chunk| {
                    chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content)
                        .filter(|s| !s.is_empty())
                });
            future::ready(parsed)
        });

        Ok(fragments.boxed())
    }

    async fn available_models(&self) -> Vec<String> {
        match self.flavor {
            OpenAIFlavor::OpenAI => OPENAI_MODELS.iter().map(|m| m.to_string()).collect(),
            OpenAIFlavor::Xai => XAI_MODELS.iter().map(|m| m.to_string()).collect(),
            OpenAIFlavor::LmStudio => {
                probe::models_or(self.flavor.id(), self.fetch_models().await, Vec::new)
            }
        }
    }

    async fn health_check(&self) -> bool {
        probe::healthy(self.flavor.id(), self.probe_health().await)
    }

    fn provider_name(&self) -> &str {
        self.flavor.id()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Look up a known OpenAI embedding dimension
pub fn openai_embedding_dimension(model: &str) -> Option<usize> {
    OPENAI_EMBEDDING_MODELS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, dims)| *dims)
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI `/embeddings` backend
pub struct OpenAIEmbeddingProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

impl OpenAIEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model.clone(),
            dimension: openai_embedding_dimension(&config.model).unwrap_or(config.dimension),
        })
    }

    async fn embed_with_timeout(
        &self,
        texts: &[String],
        timeout: Duration,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RagError::Config("openai embeddings require an API key (set OPENAI_API_KEY)".into())
        })?;

        let response = self
            .http
            .post(join_url(&self.base_url, "embeddings"))
            .bearer_auth(api_key)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .timeout(timeout)
            .send()
            .await?;
        let response = check_status("openai", response).await?;
        let mut body: EmbedResponse = response.json().await?;

        if body.data.len() != texts.len() {
            return Err(RagError::provider(
                "openai",
                format!(
                    "expected {} embeddings, received {}",
                    texts.len(),
                    body.data.len()
                ),
            ));
        }

        body.data.sort_by_key(|d| d.index);
        check_dimensions(
            "openai",
            self.dimension,
            body.data.into_iter().map(|d| d.embedding).collect(),
        )
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::provider("openai", "no embedding returned"))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tracing::debug!("openai embedding batch of {} texts", texts.len());
        self.embed_with_timeout(texts, EMBED_TIMEOUT).await
    }

    async fn available_models(&self) -> Vec<String> {
        OPENAI_EMBEDDING_MODELS
            .iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    async fn health_check(&self) -> bool {
        let probe = self
            .embed_with_timeout(&["test".to_string()], PROBE_TIMEOUT)
            .await
            .map(|_| ())
            .map_err(|e| ProbeError::Unavailable(e.to_string()));
        probe::healthy("openai", probe)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
