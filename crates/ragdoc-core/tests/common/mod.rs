//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use ragdoc_core::{
    EmbeddingProvider, GenerationResult, LanguageModelProvider, Message, RagError, Result,
    TextStream,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub fn pages(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|t| t.to_string()).collect()
}

/// Deterministic bag-of-words embedder.
///
/// Each lowercase word is hashed into one of `dim` buckets and the result is
/// L2-normalised, so texts sharing words score close together.
pub struct HashEmbedder {
    dim: usize,
    fail_marker: Option<String>,
    pub batch_calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            fail_marker: None,
            batch_calls: AtomicUsize::new(0),
        }
    }

    /// Fail any call whose input contains `marker`
    pub fn failing_on(dim: usize, marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Self::new(dim)
        }
    }

    pub fn calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(RagError::provider("hash", "embedding backend exploded"));
            }
        }

        let mut v = vec![0f32; self.dim];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) as usize % self.dim;
            v[bucket] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.vector(text)
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|t| self.vector(t)).collect()
    }

    async fn available_models(&self) -> Vec<String> {
        vec!["hash".to_string()]
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn provider_name(&self) -> &str {
        "hash"
    }

    fn model_name(&self) -> &str {
        "hash"
    }
}

pub const UNCERTAIN_ANSWER: &str =
    "I don't know. The provided documents do not contain that information.";

/// Language model stub that follows the grounding rules of the system prompt.
///
/// It answers with the first context line sharing a word with the question,
/// and admits uncertainty when none does. Every prompt it receives is kept.
#[derive(Default)]
pub struct ScriptedLlm {
    pub prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlm {
    pub fn last_prompt(&self) -> Vec<Message> {
        self.prompts
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }

    fn answer(&self, messages: &[Message]) -> String {
        self.prompts.lock().unwrap().push(messages.to_vec());

        let user = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        let (context, question) = user.split_once("\n\nQuestion: ").unwrap_or(("", user));
        let keywords: Vec<String> = question
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3)
            .map(|w| w.to_lowercase())
            .collect();

        context
            .lines()
            .filter(|line| !line.starts_with('[') && !line.starts_with("Context:"))
            .find(|line| {
                let line = line.to_lowercase();
                keywords.iter().any(|k| line.contains(k.as_str()))
            })
            .map(|line| format!("According to the documents: {}", line))
            .unwrap_or_else(|| UNCERTAIN_ANSWER.to_string())
    }
}

#[async_trait]
impl LanguageModelProvider for ScriptedLlm {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult> {
        Ok(GenerationResult {
            text: self.answer(messages),
            model: "scripted".to_string(),
            usage: None,
        })
    }

    async fn generate_stream(&self, messages: &[Message]) -> Result<TextStream> {
        let answer = self.answer(messages);
        let words: Vec<Result<String>> = answer
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(stream::iter(words).boxed())
    }

    async fn available_models(&self) -> Vec<String> {
        vec!["scripted".to_string()]
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// One request seen by [`MockServer`]
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    /// Path including the query string
    pub path: String,
    /// Header block, lowercased
    pub headers: String,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

pub struct MockResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub delay: Duration,
    /// When non-empty the body is sent as these parts, `interval` apart,
    /// and delimited by closing the connection
    pub parts: Vec<String>,
    pub interval: Duration,
}

impl MockResponse {
    pub fn json(value: serde_json::Value) -> Self {
        Self::text(200, "application/json", value.to_string())
    }

    pub fn text(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
            delay: Duration::ZERO,
            parts: Vec::new(),
            interval: Duration::ZERO,
        }
    }

    /// Slow body written part by part
    pub fn trickle(content_type: &'static str, parts: Vec<String>, interval: Duration) -> Self {
        Self {
            parts,
            interval,
            ..Self::text(200, content_type, "")
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Handler = Arc<dyn Fn(&Recorded) -> MockResponse + Send + Sync>;

/// Minimal HTTP/1.1 server on an ephemeral port.
///
/// Every connection is served on its own task and closed after one response.
pub struct MockServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    hangups: Arc<AtomicUsize>,
}

impl MockServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Recorded) -> MockResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Handler = Arc::new(handler);

        let seen = requests.clone();
        let hangups = Arc::new(AtomicUsize::new(0));
        let hung_up = hangups.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let handler = handler.clone();
                let seen = seen.clone();
                let hung_up = hung_up.clone();
                tokio::spawn(async move {
                    let Some(request) = read_request(&mut socket).await else {
                        return;
                    };
                    seen.lock().unwrap().push(request.clone());
                    let response = handler(&request);
                    if !response.delay.is_zero() {
                        tokio::time::sleep(response.delay).await;
                    }

                    if response.parts.is_empty() {
                        let head = format!(
                            "HTTP/1.1 {} Mock\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            response.status,
                            response.content_type,
                            response.body.len()
                        );
                        let _ = socket.write_all(head.as_bytes()).await;
                        let _ = socket.write_all(response.body.as_bytes()).await;
                    } else {
                        let head = format!(
                            "HTTP/1.1 {} Mock\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
                            response.status, response.content_type
                        );
                        let _ = socket.write_all(head.as_bytes()).await;
                        for part in &response.parts {
                            let written: std::io::Result<()> = async {
                                socket.write_all(part.as_bytes()).await?;
                                socket.flush().await
                            }
                            .await;
                            if written.is_err() {
                                hung_up.fetch_add(1, Ordering::SeqCst);
                                return;
                            }
                            tokio::time::sleep(response.interval).await;
                        }
                    }
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
            hangups,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Streamed responses cut short because the client went away
    pub fn hangups(&self) -> usize {
        self.hangups.load(Ordering::SeqCst)
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers = head.to_lowercase();

    let content_length = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(Recorded {
        method,
        path,
        headers,
        body,
    })
}
