//! Google Gemini backend (Generative Language REST API)

use super::http::{
    build_client, check_status, join_url, sse_data, GENERATE_TIMEOUT, PROBE_TIMEOUT,
};
use super::probe::{self, ProbeError};
use super::traits::{
    GenerationResult, LanguageModelProvider, Message, Role, TextStream, Usage,
};
use crate::config::LLMConfig;
use crate::error::{RagError, Result};
use async_trait::async_trait;
use futures::{future, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const GEMINI_MODELS: &[&str] = &[
    "gemini-1.5-pro",
    "gemini-1.5-flash",
    "gemini-1.0-pro",
    "gemini-pro",
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Gemini chat backend
pub struct GoogleProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl GoogleProvider {
    pub fn new(config: &LLMConfig) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Gemini keeps the system turn apart and calls the assistant `model`
    fn build_request(&self, messages: &[Message], max_tokens: Option<u32>) -> GenerateRequest {
        let system: Vec<Part> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| Part {
                text: m.content.clone(),
            })
            .collect();

        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: Some(
                    match m.role {
                        Role::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect();

        GenerateRequest {
            contents,
            system_instruction: (!system.is_empty()).then(|| Content {
                role: None,
                parts: system,
            }),
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: max_tokens,
            },
        }
    }

    fn endpoint(&self, method: &str) -> Result<(String, &str)> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RagError::Config("google requires an API key (set GOOGLE_API_KEY)".to_string())
        })?;
        let url = join_url(
            &self.base_url,
            &format!("models/{}:{}", self.model, method),
        );
        Ok((url, api_key))
    }

    async fn complete(
        &self,
        messages: &[Message],
        max_tokens: Option<u32>,
        timeout: Duration,
    ) -> Result<GenerationResult> {
        let (url, api_key) = self.endpoint("generateContent")?;
        let response = self
            .http
            .post(url)
            .query(&[("key", api_key)])
            .json(&self.build_request(messages, max_tokens))
            .timeout(timeout)
            .send()
            .await?;
        let body: GenerateResponse = check_status("google", response).await?.json().await?;

        if body.candidates.is_empty() {
            return Err(RagError::provider("google", "response contained no candidates"));
        }

        Ok(GenerationResult {
            text: body.text(),
            model: body.model_version.clone().unwrap_or_else(|| self.model.clone()),
            usage: body.usage_metadata.as_ref().map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
        })
    }
}

#[async_trait]
impl LanguageModelProvider for GoogleProvider {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult> {
        tracing::debug!("gemini generate: model={}", self.model);
        self.complete(messages, self.max_tokens, GENERATE_TIMEOUT)
            .await
    }

    async fn generate_stream(&self, messages: &[Message]) -> Result<TextStream> {
        let (url, api_key) = self.endpoint("streamGenerateContent")?;
        let response = self
            .http
            .post(url)
            .query(&[("alt", "sse"), ("key", api_key)])
            .json(&self.build_request(messages, self.max_tokens))
            .send()
            .await?;
        let response = check_status("google", response).await?;

        let fragments = sse_data("google", response).try_filter_map(|data| {
            future::ready(
                serde_json::from_str::<GenerateResponse>(&data)
                    .map(|chunk| Some(chunk.text()).filter(|t| !t.is_empty()))
                    .map_err(|e| RagError::provider("google", format!("bad stream chunk: {}", e))),
            )
        });

        Ok(fragments.boxed())
    }

    async fn available_models(&self) -> Vec<String> {
        GEMINI_MODELS.iter().map(|m| m.to_string()).collect()
    }

    async fn health_check(&self) -> bool {
        let probe = self
            .complete(&[Message::user("hi")], Some(1), PROBE_TIMEOUT)
            .await
            .map(|_| ())
            .map_err(|e| ProbeError::Unavailable(e.to_string()));
        probe::healthy("google", probe)
    }

    fn provider_name(&self) -> &str {
        "google"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
